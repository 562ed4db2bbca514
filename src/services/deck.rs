//! Deck service — CRUD with ownership checks and soft deletes.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("deck not found: {0}")]
    NotFound(Uuid),
    #[error("deck {0} belongs to another user")]
    Forbidden(Uuid),
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

const DECK_COLUMNS: &str = "id, user_id, title, description, created_at, updated_at";

// =============================================================================
// CRUD
// =============================================================================

/// Create a deck owned by `user_id`.
///
/// # Errors
///
/// Returns `EmptyTitle` for a blank title, or a database error.
pub async fn create_deck(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
    description: Option<&str>,
) -> Result<Deck, DeckError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DeckError::EmptyTitle);
    }

    let deck = sqlx::query_as::<_, Deck>(&format!(
        "INSERT INTO decks (user_id, title, description)
         VALUES ($1, $2, $3)
         RETURNING {DECK_COLUMNS}"
    ))
    .bind(user_id)
    .bind(title)
    .bind(description)
    .fetch_one(pool)
    .await?;

    tracing::info!(deck_id = %deck.id, %user_id, "deck created");
    Ok(deck)
}

/// List the caller's non-deleted decks, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_decks(pool: &PgPool, user_id: Uuid) -> Result<Vec<Deck>, DeckError> {
    let decks = sqlx::query_as::<_, Deck>(&format!(
        "SELECT {DECK_COLUMNS} FROM decks
         WHERE user_id = $1 AND deleted_at IS NULL
         ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(decks)
}

/// Fetch one deck, enforcing ownership.
///
/// # Errors
///
/// `NotFound` if missing or soft-deleted, `Forbidden` if owned by another
/// user, or a database error.
pub async fn get_deck(pool: &PgPool, deck_id: Uuid, user_id: Uuid) -> Result<Deck, DeckError> {
    let deck = sqlx::query_as::<_, Deck>(&format!(
        "SELECT {DECK_COLUMNS} FROM decks
         WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(deck_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DeckError::NotFound(deck_id))?;

    if deck.user_id != user_id {
        return Err(DeckError::Forbidden(deck_id));
    }
    Ok(deck)
}

/// Partially update a deck. Blank or missing fields keep their values.
///
/// # Errors
///
/// Same ownership errors as [`get_deck`], or a database error.
pub async fn update_deck(
    pool: &PgPool,
    deck_id: Uuid,
    user_id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<Deck, DeckError> {
    get_deck(pool, deck_id, user_id).await?;

    let title = title.map(str::trim).filter(|t| !t.is_empty());
    let deck = sqlx::query_as::<_, Deck>(&format!(
        "UPDATE decks
         SET title = COALESCE($2, title),
             description = COALESCE($3, description),
             updated_at = now()
         WHERE id = $1
         RETURNING {DECK_COLUMNS}"
    ))
    .bind(deck_id)
    .bind(title)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(deck)
}

/// Soft-delete a deck and its cards.
///
/// # Errors
///
/// Same ownership errors as [`get_deck`], or a database error.
pub async fn delete_deck(pool: &PgPool, deck_id: Uuid, user_id: Uuid) -> Result<(), DeckError> {
    get_deck(pool, deck_id, user_id).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE decks SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(deck_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "UPDATE cards SET deleted_at = now(), updated_at = now()
         WHERE deck_id = $1 AND deleted_at IS NULL",
    )
    .bind(deck_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(%deck_id, %user_id, "deck soft-deleted");
    Ok(())
}
