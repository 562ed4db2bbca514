//! Card service — CRUD, review bookkeeping, and status transitions.
//!
//! DESIGN
//! ======
//! A card's ownership is derived through its deck, so every mutation first
//! resolves the deck with the caller's id. Status transitions are a pure
//! function of (status, review count, correctness) and are kept free of SQL
//! so the boundary cases are directly testable.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::deck::{self, DeckError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("card not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error("front and back must not be empty")]
    EmptyField,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub front: String,
    pub back: String,
    pub hint: Option<String>,
    pub review_count: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_review: Option<OffsetDateTime>,
    pub status: String,
    pub generation_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const CARD_COLUMNS: &str = "id, deck_id, front, back, hint, review_count, last_review, status, \
                            generation_type, created_at, updated_at";

// =============================================================================
// STATUS TRANSITIONS
// =============================================================================

/// Next status after a review. `review_count` is the count including the
/// review being recorded. Correct answers promote new cards after their
/// second review and learning cards after their fifth; an incorrect answer
/// demotes a mastered card back to learning.
#[must_use]
pub fn next_status(status: &str, review_count: i32, is_correct: bool) -> &'static str {
    if is_correct {
        match status {
            "new" if review_count >= 2 => "learning",
            "learning" if review_count >= 5 => "mastered",
            "new" => "new",
            "learning" => "learning",
            _ => "mastered",
        }
    } else {
        match status {
            "mastered" => "learning",
            "learning" => "learning",
            _ => "new",
        }
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a manual card in a deck the caller owns.
///
/// # Errors
///
/// Deck ownership errors, `EmptyField` for blank front/back, or a database
/// error.
pub async fn create_card(
    pool: &PgPool,
    deck_id: Uuid,
    user_id: Uuid,
    front: &str,
    back: &str,
    hint: Option<&str>,
) -> Result<Card, CardError> {
    deck::get_deck(pool, deck_id, user_id).await?;

    let (front, back) = (front.trim(), back.trim());
    if front.is_empty() || back.is_empty() {
        return Err(CardError::EmptyField);
    }

    let card = sqlx::query_as::<_, Card>(&format!(
        "INSERT INTO cards (deck_id, front, back, hint)
         VALUES ($1, $2, $3, $4)
         RETURNING {CARD_COLUMNS}"
    ))
    .bind(deck_id)
    .bind(front)
    .bind(back)
    .bind(hint)
    .fetch_one(pool)
    .await?;
    Ok(card)
}

/// List the non-deleted cards of a deck the caller owns, oldest first.
///
/// # Errors
///
/// Deck ownership errors or a database error.
pub async fn list_cards(pool: &PgPool, deck_id: Uuid, user_id: Uuid) -> Result<Vec<Card>, CardError> {
    deck::get_deck(pool, deck_id, user_id).await?;

    let cards = sqlx::query_as::<_, Card>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards
         WHERE deck_id = $1 AND deleted_at IS NULL
         ORDER BY created_at ASC"
    ))
    .bind(deck_id)
    .fetch_all(pool)
    .await?;
    Ok(cards)
}

/// Fetch one card, enforcing ownership through its deck.
///
/// # Errors
///
/// `NotFound` if the card is missing or deleted, deck ownership errors, or a
/// database error.
pub async fn get_card(pool: &PgPool, card_id: Uuid, user_id: Uuid) -> Result<Card, CardError> {
    let card = sqlx::query_as::<_, Card>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards
         WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(card_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CardError::NotFound(card_id))?;

    deck::get_deck(pool, card.deck_id, user_id).await?;
    Ok(card)
}

/// Partially update a card. Blank or missing fields keep their values.
///
/// # Errors
///
/// Same errors as [`get_card`], or a database error.
pub async fn update_card(
    pool: &PgPool,
    card_id: Uuid,
    user_id: Uuid,
    front: Option<&str>,
    back: Option<&str>,
    hint: Option<&str>,
) -> Result<Card, CardError> {
    get_card(pool, card_id, user_id).await?;

    let front = front.map(str::trim).filter(|s| !s.is_empty());
    let back = back.map(str::trim).filter(|s| !s.is_empty());
    let card = sqlx::query_as::<_, Card>(&format!(
        "UPDATE cards
         SET front = COALESCE($2, front),
             back = COALESCE($3, back),
             hint = COALESCE($4, hint),
             updated_at = now()
         WHERE id = $1
         RETURNING {CARD_COLUMNS}"
    ))
    .bind(card_id)
    .bind(front)
    .bind(back)
    .bind(hint)
    .fetch_one(pool)
    .await?;
    Ok(card)
}

/// Soft-delete a card.
///
/// # Errors
///
/// Same errors as [`get_card`], or a database error.
pub async fn delete_card(pool: &PgPool, card_id: Uuid, user_id: Uuid) -> Result<(), CardError> {
    get_card(pool, card_id, user_id).await?;

    sqlx::query("UPDATE cards SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(card_id)
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// REVIEW
// =============================================================================

/// Bump review bookkeeping without an answer record or status change.
///
/// # Errors
///
/// Same errors as [`get_card`], or a database error.
pub async fn mark_learning(pool: &PgPool, card_id: Uuid, user_id: Uuid) -> Result<Card, CardError> {
    get_card(pool, card_id, user_id).await?;

    let card = sqlx::query_as::<_, Card>(&format!(
        "UPDATE cards
         SET review_count = review_count + 1, last_review = now(), updated_at = now()
         WHERE id = $1
         RETURNING {CARD_COLUMNS}"
    ))
    .bind(card_id)
    .fetch_one(pool)
    .await?;
    Ok(card)
}

/// Record one answer: insert the immutable answer record and apply the
/// status transition, atomically.
///
/// # Errors
///
/// `NotFound` if the card is not in the given deck, deck ownership errors,
/// or a database error.
pub async fn record_answer(
    pool: &PgPool,
    deck_id: Uuid,
    card_id: Uuid,
    user_id: Uuid,
    is_correct: bool,
    study_time_secs: i32,
) -> Result<Card, CardError> {
    deck::get_deck(pool, deck_id, user_id).await?;

    let card = sqlx::query_as::<_, Card>(&format!(
        "SELECT {CARD_COLUMNS} FROM cards
         WHERE id = $1 AND deck_id = $2 AND deleted_at IS NULL"
    ))
    .bind(card_id)
    .bind(deck_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CardError::NotFound(card_id))?;

    let review_count = card.review_count + 1;
    let status = next_status(&card.status, review_count, is_correct);

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO answer_records (user_id, deck_id, card_id, is_correct, study_time, answer_date)
         VALUES ($1, $2, $3, $4, $5, now())",
    )
    .bind(user_id)
    .bind(deck_id)
    .bind(card_id)
    .bind(is_correct)
    .bind(study_time_secs)
    .execute(&mut *tx)
    .await?;

    let card = sqlx::query_as::<_, Card>(&format!(
        "UPDATE cards
         SET review_count = $2, last_review = now(), status = $3, updated_at = now()
         WHERE id = $1
         RETURNING {CARD_COLUMNS}"
    ))
    .bind(card_id)
    .bind(review_count)
    .bind(status)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(%card_id, %deck_id, is_correct, status = %card.status, "answer recorded");
    Ok(card)
}

#[cfg(test)]
#[path = "card_test.rs"]
mod tests;
