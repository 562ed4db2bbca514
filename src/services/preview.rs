//! Preview sessions — staged AI card batches awaiting confirmation.
//!
//! DESIGN
//! ======
//! A preview batch is a set of `card_previews` rows sharing a random session
//! id, expiring 24 hours after creation. Reads drop rows whose `expires_at`
//! has passed, so an expired session is indistinguishable from one that
//! never existed.

use std::fmt::Write;

use rand::Rng;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

pub const PREVIEW_TTL_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("preview session not found or expired: {0}")]
    SessionNotFound(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a random 128-bit hex session id.
#[must_use]
pub fn generate_session_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// One staged card within a preview session.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CardPreview {
    pub id: Uuid,
    pub session_id: String,
    pub deck_title: String,
    pub deck_description: Option<String>,
    pub front: String,
    pub back: String,
    pub generation_type: String,
    pub original_prompt: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

const PREVIEW_COLUMNS: &str = "id, session_id, deck_title, deck_description, front, back, \
                               generation_type, original_prompt, expires_at";

/// Stage a batch of generated cards under a fresh session id.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    deck_title: &str,
    deck_description: Option<&str>,
    cards: &[(String, String)],
    generation_type: &str,
    original_prompt: Option<&str>,
) -> Result<Vec<CardPreview>, PreviewError> {
    let session_id = generate_session_id();
    let expires_at = OffsetDateTime::now_utc() + time::Duration::hours(PREVIEW_TTL_HOURS);

    let mut tx = pool.begin().await?;
    let previews = insert_rows(
        &mut tx,
        user_id,
        &session_id,
        deck_title,
        deck_description,
        cards,
        generation_type,
        original_prompt,
        expires_at,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(session_id, count = previews.len(), "preview session created");
    Ok(previews)
}

/// Load a caller's non-expired previews for a session.
///
/// # Errors
///
/// `SessionNotFound` when no live rows match, or a database error.
pub async fn load_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: &str,
) -> Result<Vec<CardPreview>, PreviewError> {
    let previews = sqlx::query_as::<_, CardPreview>(&format!(
        "SELECT {PREVIEW_COLUMNS} FROM card_previews
         WHERE user_id = $1 AND session_id = $2
         ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    live_previews(previews, session_id, OffsetDateTime::now_utc())
}

fn is_live(expires_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    expires_at > now
}

/// Keep only unexpired rows; an all-expired (or empty) batch reads as a
/// missing session.
fn live_previews(
    previews: Vec<CardPreview>,
    session_id: &str,
    now: OffsetDateTime,
) -> Result<Vec<CardPreview>, PreviewError> {
    let live: Vec<CardPreview> =
        previews.into_iter().filter(|p| is_live(p.expires_at, now)).collect();
    if live.is_empty() {
        return Err(PreviewError::SessionNotFound(session_id.to_owned()));
    }
    Ok(live)
}

/// Delete a session's rows. Best-effort callers ignore the result.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: &str,
) -> Result<(), PreviewError> {
    sqlx::query("DELETE FROM card_previews WHERE user_id = $1 AND session_id = $2")
        .bind(user_id)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Replace a session's batch with regenerated cards, atomically. The old
/// rows survive any failure before the commit.
///
/// # Errors
///
/// Returns a database error if the transaction fails.
#[allow(clippy::too_many_arguments)]
pub async fn replace_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: &str,
    deck_title: &str,
    deck_description: Option<&str>,
    cards: &[(String, String)],
    generation_type: &str,
    original_prompt: Option<&str>,
) -> Result<Vec<CardPreview>, PreviewError> {
    let expires_at = OffsetDateTime::now_utc() + time::Duration::hours(PREVIEW_TTL_HOURS);

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM card_previews WHERE user_id = $1 AND session_id = $2")
        .bind(user_id)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;
    let previews = insert_rows(
        &mut tx,
        user_id,
        session_id,
        deck_title,
        deck_description,
        cards,
        generation_type,
        original_prompt,
        expires_at,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(session_id, count = previews.len(), "preview session replaced");
    Ok(previews)
}

#[allow(clippy::too_many_arguments)]
async fn insert_rows(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    session_id: &str,
    deck_title: &str,
    deck_description: Option<&str>,
    cards: &[(String, String)],
    generation_type: &str,
    original_prompt: Option<&str>,
    expires_at: OffsetDateTime,
) -> Result<Vec<CardPreview>, sqlx::Error> {
    let mut previews = Vec::with_capacity(cards.len());
    for (front, back) in cards {
        let preview = sqlx::query_as::<_, CardPreview>(&format!(
            "INSERT INTO card_previews
                 (user_id, session_id, deck_title, deck_description, front, back,
                  generation_type, original_prompt, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PREVIEW_COLUMNS}"
        ))
        .bind(user_id)
        .bind(session_id)
        .bind(deck_title)
        .bind(deck_description)
        .bind(front)
        .bind(back)
        .bind(generation_type)
        .bind(original_prompt)
        .bind(expires_at)
        .fetch_one(&mut **tx)
        .await?;
        previews.push(preview);
    }
    Ok(previews)
}

#[cfg(test)]
#[path = "preview_test.rs"]
mod tests;
