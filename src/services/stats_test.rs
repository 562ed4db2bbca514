use super::*;

use time::macros::date;

// =============================================================================
// study_streak
// =============================================================================

#[test]
fn streak_zero_with_no_answers() {
    assert_eq!(study_streak(&[], date!(2026 - 08 - 28)), 0);
}

#[test]
fn streak_one_for_today_only() {
    assert_eq!(study_streak(&[date!(2026 - 08 - 28)], date!(2026 - 08 - 28)), 1);
}

#[test]
fn streak_counts_consecutive_days_back_from_today() {
    let days = [date!(2026 - 08 - 28), date!(2026 - 08 - 27), date!(2026 - 08 - 26)];
    assert_eq!(study_streak(&days, date!(2026 - 08 - 28)), 3);
}

#[test]
fn streak_zero_when_today_missing() {
    let days = [date!(2026 - 08 - 27), date!(2026 - 08 - 26)];
    assert_eq!(study_streak(&days, date!(2026 - 08 - 28)), 0);
}

#[test]
fn streak_stops_at_gap() {
    let days = [date!(2026 - 08 - 28), date!(2026 - 08 - 27), date!(2026 - 08 - 25)];
    assert_eq!(study_streak(&days, date!(2026 - 08 - 28)), 2);
}

#[test]
fn streak_ignores_duplicate_days() {
    let days = [date!(2026 - 08 - 28), date!(2026 - 08 - 28), date!(2026 - 08 - 27)];
    assert_eq!(study_streak(&days, date!(2026 - 08 - 28)), 2);
}

#[test]
fn streak_crosses_month_boundary() {
    let days = [date!(2026 - 09 - 01), date!(2026 - 08 - 31), date!(2026 - 08 - 30)];
    assert_eq!(study_streak(&days, date!(2026 - 09 - 01)), 3);
}
