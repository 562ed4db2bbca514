//! Deck statistics — status counts, accuracy, and study streak.
//!
//! DESIGN
//! ======
//! Stats are derived on read, never stored. The streak walks backwards from
//! today over the distinct calendar days with at least one answer, breaking
//! at the first gap; it is a pure function over the day list so the edge
//! cases are testable without a database.

use std::collections::HashSet;

use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::deck::{self, DeckError};

#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckStats {
    pub total_cards: i64,
    pub new_cards: i64,
    pub learning_cards: i64,
    pub mastered_cards: i64,
    pub progress_percent: f64,
    pub accuracy_rate: f64,
    pub total_study_time: i64,
    pub study_streak: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_studied_at: Option<OffsetDateTime>,
}

// =============================================================================
// STREAK
// =============================================================================

/// Consecutive study days ending today. No answer today means 0.
#[must_use]
pub fn study_streak(answer_days: &[Date], today: Date) -> i64 {
    let days: HashSet<Date> = answer_days.iter().copied().collect();
    let mut streak = 0;
    let mut day = today;
    while days.contains(&day) {
        streak += 1;
        let Some(previous) = day.previous_day() else {
            break;
        };
        day = previous;
    }
    streak
}

// =============================================================================
// AGGREGATION
// =============================================================================

/// Compute stats for a deck the caller owns.
///
/// # Errors
///
/// Deck ownership errors or a database error.
pub async fn deck_stats(
    pool: &PgPool,
    deck_id: Uuid,
    user_id: Uuid,
) -> Result<DeckStats, StatsError> {
    deck::get_deck(pool, deck_id, user_id).await?;

    let (total, new_cards, learning, mastered) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
        "SELECT COUNT(*),
                COUNT(*) FILTER (WHERE status = 'new'),
                COUNT(*) FILTER (WHERE status = 'learning'),
                COUNT(*) FILTER (WHERE status = 'mastered')
         FROM cards
         WHERE deck_id = $1 AND deleted_at IS NULL",
    )
    .bind(deck_id)
    .fetch_one(pool)
    .await?;

    let (answers, correct, study_time, last_studied_at) =
        sqlx::query_as::<_, (i64, i64, Option<i64>, Option<OffsetDateTime>)>(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE is_correct),
                    SUM(study_time),
                    MAX(answer_date)
             FROM answer_records
             WHERE deck_id = $1 AND user_id = $2",
        )
        .bind(deck_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let answer_days = sqlx::query_scalar::<_, Date>(
        "SELECT DISTINCT (answer_date AT TIME ZONE 'UTC')::date
         FROM answer_records
         WHERE deck_id = $1 AND user_id = $2",
    )
    .bind(deck_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    #[allow(clippy::cast_precision_loss)]
    let progress_percent = if total == 0 { 0.0 } else { mastered as f64 / total as f64 * 100.0 };
    #[allow(clippy::cast_precision_loss)]
    let accuracy_rate = if answers == 0 { 0.0 } else { correct as f64 / answers as f64 * 100.0 };

    Ok(DeckStats {
        total_cards: total,
        new_cards,
        learning_cards: learning,
        mastered_cards: mastered,
        progress_percent,
        accuracy_rate,
        total_study_time: study_time.unwrap_or(0),
        study_streak: study_streak(&answer_days, OffsetDateTime::now_utc().date()),
        last_studied_at,
    })
}

#[cfg(test)]
#[path = "stats_test.rs"]
mod tests;
