use super::*;

// =============================================================================
// next_status
// =============================================================================

#[test]
fn new_card_stays_new_on_first_correct() {
    assert_eq!(next_status("new", 1, true), "new");
}

#[test]
fn new_card_promotes_to_learning_on_second_correct() {
    assert_eq!(next_status("new", 2, true), "learning");
}

#[test]
fn learning_card_stays_learning_before_fifth_review() {
    assert_eq!(next_status("learning", 3, true), "learning");
    assert_eq!(next_status("learning", 4, true), "learning");
}

#[test]
fn learning_card_masters_on_fifth_correct() {
    assert_eq!(next_status("learning", 5, true), "mastered");
}

#[test]
fn mastered_card_stays_mastered_on_correct() {
    assert_eq!(next_status("mastered", 12, true), "mastered");
}

#[test]
fn mastered_card_demotes_on_incorrect() {
    assert_eq!(next_status("mastered", 12, false), "learning");
}

#[test]
fn learning_card_holds_on_incorrect() {
    assert_eq!(next_status("learning", 4, false), "learning");
}

#[test]
fn new_card_stays_new_on_incorrect() {
    assert_eq!(next_status("new", 1, false), "new");
}

#[test]
fn unknown_status_resets_to_new_on_incorrect() {
    assert_eq!(next_status("archived", 7, false), "new");
}
