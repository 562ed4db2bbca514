//! AI generation orchestrator — prompts, model calls, parsing, persistence.
//!
//! DESIGN
//! ======
//! Every flow is the same pipeline: classify input, validate it, build a
//! prompt, call the model, extract and validate the JSON payload, persist.
//! The pure stages (prompt templates, JSON extraction, card validation) are
//! free functions so they can be tested without a provider. Model calls go
//! through the [`GenerateText`] trait; persistence is all-or-nothing per
//! batch.

use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::genai::{GenAiError, GenerateText, GenerationParams, Part};

use super::card::Card;
use super::deck::{self, Deck, DeckError};
use super::preview::{self, CardPreview, PreviewError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("prompt must not be empty")]
    MissingPrompt,
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("file too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },
    #[error("maxCards must be between 1 and 100")]
    BadCardCount,
    #[error("generation unavailable")]
    NoProvider,
    #[error(transparent)]
    Provider(#[from] GenAiError),
    #[error("model response was not the expected JSON: {0}")]
    ParseFailed(String),
    #[error("no valid cards were generated")]
    NoValidCards,
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Preview(#[from] PreviewError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Classified request input. Exactly one modality per call; an image part
/// wins over audio when both are uploaded.
#[derive(Debug, Clone)]
pub enum GenInput {
    Text { prompt: String },
    Image { mime_type: String, data: Vec<u8> },
    Audio { mime_type: String, data: Vec<u8> },
}

impl GenInput {
    #[must_use]
    pub fn generation_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Audio { .. } => "audio",
        }
    }

    fn original_prompt(&self) -> Option<&str> {
        match self {
            Self::Text { prompt } => Some(prompt),
            _ => None,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct GeneratedDeck {
    title: String,
    #[serde(default)]
    description: Option<String>,
    cards: Vec<GeneratedCard>,
}

#[derive(Debug, serde::Deserialize)]
pub struct GeneratedCard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDeckResponse {
    pub deck: Deck,
    pub cards: Vec<Card>,
}

// =============================================================================
// INPUT VALIDATION
// =============================================================================

pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;
pub const MAX_AUDIO_BYTES: usize = 50 * 1024 * 1024;
pub const DEFAULT_MAX_CARDS: usize = 20;

const IMAGE_TYPES: [&str; 5] =
    ["image/png", "image/jpeg", "image/webp", "image/heic", "image/heif"];
const AUDIO_TYPES: [&str; 6] =
    ["audio/wav", "audio/mp3", "audio/aiff", "audio/aac", "audio/ogg", "audio/flac"];

/// # Errors
///
/// Rejects unknown image MIME types and files over 20 MB.
pub fn validate_image(mime_type: &str, size: usize) -> Result<(), GenerateError> {
    if size > MAX_IMAGE_BYTES {
        return Err(GenerateError::FileTooLarge { size, max: MAX_IMAGE_BYTES });
    }
    if !IMAGE_TYPES.contains(&mime_type) {
        return Err(GenerateError::UnsupportedMediaType(mime_type.to_owned()));
    }
    Ok(())
}

/// # Errors
///
/// Rejects unknown audio MIME types and files over 50 MB. `audio/webm` is
/// accepted only when `allow_webm` is set (transcription).
pub fn validate_audio(mime_type: &str, size: usize, allow_webm: bool) -> Result<(), GenerateError> {
    if size > MAX_AUDIO_BYTES {
        return Err(GenerateError::FileTooLarge { size, max: MAX_AUDIO_BYTES });
    }
    if AUDIO_TYPES.contains(&mime_type) || (allow_webm && mime_type == "audio/webm") {
        return Ok(());
    }
    Err(GenerateError::UnsupportedMediaType(mime_type.to_owned()))
}

/// # Errors
///
/// Rejects a requested card count outside 1..=100.
pub fn validate_max_cards(max_cards: usize) -> Result<usize, GenerateError> {
    if (1..=100).contains(&max_cards) {
        Ok(max_cards)
    } else {
        Err(GenerateError::BadCardCount)
    }
}

// =============================================================================
// PROMPTS
// =============================================================================

const JSON_DECK_SHAPE: &str = r#"Return only JSON in exactly this shape, with no other text:
{
  "title": "deck title, short and clear",
  "description": "what this deck teaches",
  "cards": [
    {
      "front": "question or study point",
      "back": "detailed answer or explanation"
    }
  ]
}"#;

const TRANSCRIBE_PROMPT: &str =
    "Transcribe this audio recording verbatim. Return only the transcribed text, \
     with no commentary or formatting.";

fn new_deck_prompt(input: &GenInput, max_cards: usize) -> String {
    match input {
        GenInput::Text { prompt } => format!(
            "Generate {max_cards} educational flashcards about the following topic, \
             and create a fitting deck title and description.\n\n\
             Topic: {prompt}\n\n{JSON_DECK_SHAPE}"
        ),
        GenInput::Image { .. } => format!(
            "Analyze this image in detail, considering any text (OCR), objects, people, \
             places, concepts, and historical or cultural context. Generate {max_cards} \
             educational flashcards from it, and create a fitting deck title and \
             description.\n\n{JSON_DECK_SHAPE}"
        ),
        GenInput::Audio { .. } => format!(
            "Analyze this audio recording and generate {max_cards} educational flashcards \
             from its key concepts, terms, main points, and examples, and create a fitting \
             deck title and description.\n\n{JSON_DECK_SHAPE}"
        ),
    }
}

fn append_prompt(input: &GenInput, max_cards: usize) -> String {
    let array_shape = r#"Return only a JSON array in exactly this shape, with no other text:
[
  {
    "front": "question or study point",
    "back": "detailed answer or explanation"
  }
]"#;
    match input {
        GenInput::Text { prompt } => format!(
            "Generate {max_cards} educational flashcards based on the following \
             instructions:\n{prompt}\n\n{array_shape}"
        ),
        GenInput::Image { .. } => format!(
            "Analyze this image and generate {max_cards} educational flashcards from \
             it.\n\n{array_shape}"
        ),
        GenInput::Audio { .. } => format!(
            "Analyze this audio recording and generate {max_cards} educational flashcards \
             from it.\n\n{array_shape}"
        ),
    }
}

fn regenerate_prompt(
    generation_type: &str,
    card_count: usize,
    original_prompt: Option<&str>,
    feedback: &str,
) -> String {
    match (generation_type, original_prompt) {
        ("text", Some(topic)) => format!(
            "Generate {card_count} educational flashcards about the following topic, \
             improved according to the user feedback, and create a fitting deck title \
             and description.\n\n\
             Topic: {topic}\n\n\
             User feedback: {feedback}\n\n{JSON_DECK_SHAPE}"
        ),
        _ => format!(
            "Regenerate {card_count} educational flashcards, improving on the previous \
             batch according to the user feedback, and create a fitting deck title and \
             description.\n\n\
             User feedback: {feedback}\n\n{JSON_DECK_SHAPE}"
        ),
    }
}

// =============================================================================
// GENERATION PARAMETERS
// =============================================================================

fn deck_params() -> GenerationParams {
    GenerationParams {
        temperature: 0.7,
        max_output_tokens: 3000,
        timeout: Duration::from_secs(120),
    }
}

fn append_params() -> GenerationParams {
    GenerationParams {
        temperature: 0.7,
        max_output_tokens: 2000,
        timeout: Duration::from_secs(120),
    }
}

fn transcribe_params() -> GenerationParams {
    GenerationParams { temperature: 0.1, max_output_tokens: 2000, timeout: Duration::from_secs(60) }
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// Strip a fenced code block from a model response. Handles ```json fences,
/// bare ``` fences, and unfenced output.
#[must_use]
pub fn extract_json(response: &str) -> &str {
    let text = response.trim();
    let inner = if let Some(start) = text.find("```json") {
        text.rfind("```")
            .filter(|&end| start + 7 < end)
            .map(|end| &text[start + 7..end])
    } else if let Some(start) = text.find("```") {
        text.rfind("```")
            .filter(|&end| start + 3 < end)
            .map(|end| &text[start + 3..end])
    } else {
        None
    };
    inner.unwrap_or(text).trim()
}

/// Keep only cards with a usable front and back: non-blank after trimming
/// and at most 1000 bytes. Invalid cards are skipped, not fatal; an empty
/// survivor set is.
///
/// # Errors
///
/// Returns `NoValidCards` when nothing survives.
pub fn validate_cards(cards: Vec<GeneratedCard>) -> Result<Vec<(String, String)>, GenerateError> {
    let valid: Vec<(String, String)> = cards
        .into_iter()
        .filter_map(|card| {
            let front = card.front.trim();
            let back = card.back.trim();
            if front.is_empty() || back.is_empty() || front.len() > 1000 || back.len() > 1000 {
                None
            } else {
                Some((front.to_owned(), back.to_owned()))
            }
        })
        .collect();

    if valid.is_empty() {
        return Err(GenerateError::NoValidCards);
    }
    Ok(valid)
}

fn parse_deck(response: &str) -> Result<GeneratedDeck, GenerateError> {
    let json = extract_json(response);
    serde_json::from_str(json).map_err(|e| GenerateError::ParseFailed(e.to_string()))
}

fn parse_card_array(response: &str) -> Result<Vec<GeneratedCard>, GenerateError> {
    let json = extract_json(response);
    serde_json::from_str(json).map_err(|e| GenerateError::ParseFailed(e.to_string()))
}

// =============================================================================
// MODEL CALL
// =============================================================================

async fn run_model(
    genai: &dyn GenerateText,
    input: &GenInput,
    prompt: String,
    params: GenerationParams,
) -> Result<String, GenerateError> {
    let mut parts = vec![Part::Text(prompt)];
    match input {
        GenInput::Text { .. } => {}
        GenInput::Image { mime_type, data } | GenInput::Audio { mime_type, data } => {
            parts.push(Part::InlineData { mime_type: mime_type.clone(), data: data.clone() });
        }
    }
    Ok(genai.generate(&parts, params).await?)
}

// =============================================================================
// PERSISTENCE
// =============================================================================

async fn persist_new_deck(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
    description: Option<&str>,
    cards: &[(String, String)],
    generation_type: &str,
) -> Result<GeneratedDeckResponse, GenerateError> {
    let mut tx = pool.begin().await?;
    let deck = sqlx::query_as::<_, Deck>(
        "INSERT INTO decks (user_id, title, description)
         VALUES ($1, $2, $3)
         RETURNING id, user_id, title, description, created_at, updated_at",
    )
    .bind(user_id)
    .bind(title)
    .bind(description)
    .fetch_one(&mut *tx)
    .await?;

    let inserted = insert_cards(&mut tx, deck.id, cards, generation_type).await?;
    tx.commit().await?;

    tracing::info!(deck_id = %deck.id, cards = inserted.len(), generation_type, "generated deck persisted");
    Ok(GeneratedDeckResponse { deck, cards: inserted })
}

async fn persist_into_deck(
    pool: &PgPool,
    deck: Deck,
    cards: &[(String, String)],
    generation_type: &str,
) -> Result<GeneratedDeckResponse, GenerateError> {
    let mut tx = pool.begin().await?;
    let inserted = insert_cards(&mut tx, deck.id, cards, generation_type).await?;
    tx.commit().await?;

    tracing::info!(deck_id = %deck.id, cards = inserted.len(), generation_type, "generated cards appended");
    Ok(GeneratedDeckResponse { deck, cards: inserted })
}

async fn insert_cards(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    deck_id: Uuid,
    cards: &[(String, String)],
    generation_type: &str,
) -> Result<Vec<Card>, sqlx::Error> {
    let mut inserted = Vec::with_capacity(cards.len());
    for (front, back) in cards {
        let card = sqlx::query_as::<_, Card>(
            "INSERT INTO cards (deck_id, front, back, generation_type)
             VALUES ($1, $2, $3, $4)
             RETURNING id, deck_id, front, back, hint, review_count, last_review, status,
                       generation_type, created_at, updated_at",
        )
        .bind(deck_id)
        .bind(front)
        .bind(back)
        .bind(generation_type)
        .fetch_one(&mut **tx)
        .await?;
        inserted.push(card);
    }
    Ok(inserted)
}

// =============================================================================
// FLOWS
// =============================================================================

/// Generate cards and persist them immediately, either into an existing deck
/// or into a new deck titled by the model.
///
/// # Errors
///
/// Input, provider, parse, and database errors per the pipeline stage.
pub async fn generate_direct(
    pool: &PgPool,
    genai: &dyn GenerateText,
    user_id: Uuid,
    input: GenInput,
    max_cards: usize,
    target_deck: Option<Uuid>,
) -> Result<GeneratedDeckResponse, GenerateError> {
    let max_cards = validate_max_cards(max_cards)?;
    let generation_type = input.generation_type();

    if let Some(deck_id) = target_deck {
        let deck = deck::get_deck(pool, deck_id, user_id).await?;
        let response = run_model(genai, &input, append_prompt(&input, max_cards), append_params()).await?;
        let cards = validate_cards(parse_card_array(&response)?)?;
        return persist_into_deck(pool, deck, &cards, generation_type).await;
    }

    let response = run_model(genai, &input, new_deck_prompt(&input, max_cards), deck_params()).await?;
    let generated = parse_deck(&response)?;
    let cards = validate_cards(generated.cards)?;
    persist_new_deck(
        pool,
        user_id,
        &generated.title,
        generated.description.as_deref(),
        &cards,
        generation_type,
    )
    .await
}

/// Generate cards into a preview session instead of persisting them.
///
/// # Errors
///
/// Input, provider, parse, and database errors per the pipeline stage.
pub async fn generate_preview(
    pool: &PgPool,
    genai: &dyn GenerateText,
    user_id: Uuid,
    input: GenInput,
    max_cards: usize,
) -> Result<Vec<CardPreview>, GenerateError> {
    let max_cards = validate_max_cards(max_cards)?;

    let response = run_model(genai, &input, new_deck_prompt(&input, max_cards), deck_params()).await?;
    let generated = parse_deck(&response)?;
    let cards = validate_cards(generated.cards)?;

    Ok(preview::create_session(
        pool,
        user_id,
        &generated.title,
        generated.description.as_deref(),
        &cards,
        input.generation_type(),
        input.original_prompt(),
    )
    .await?)
}

/// Materialize a preview session into real decks and cards. The previews are
/// deleted best-effort afterwards; a failed cleanup is logged, not surfaced.
///
/// # Errors
///
/// `Preview(SessionNotFound)` for missing or expired sessions, deck
/// ownership errors for an existing target deck, or a database error.
pub async fn confirm_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: &str,
    target_deck: Option<Uuid>,
) -> Result<GeneratedDeckResponse, GenerateError> {
    let previews = preview::load_session(pool, user_id, session_id).await?;
    let cards: Vec<(String, String)> = previews
        .iter()
        .map(|p| (p.front.clone(), p.back.clone()))
        .collect();
    let generation_type = previews[0].generation_type.clone();

    let outcome = if let Some(deck_id) = target_deck {
        let deck = deck::get_deck(pool, deck_id, user_id).await?;
        persist_into_deck(pool, deck, &cards, &generation_type).await?
    } else {
        persist_new_deck(
            pool,
            user_id,
            &previews[0].deck_title,
            previews[0].deck_description.as_deref(),
            &cards,
            &generation_type,
        )
        .await?
    };

    if let Err(e) = preview::delete_session(pool, user_id, session_id).await {
        tracing::warn!(error = %e, session_id, "failed to clean up confirmed previews");
    }
    Ok(outcome)
}

/// Regenerate a preview session with user feedback. The old batch is
/// replaced only after the model call and validation succeed.
///
/// # Errors
///
/// `Preview(SessionNotFound)` for missing or expired sessions, provider and
/// parse errors, or a database error.
pub async fn regenerate_session(
    pool: &PgPool,
    genai: &dyn GenerateText,
    user_id: Uuid,
    session_id: &str,
    feedback: &str,
) -> Result<Vec<CardPreview>, GenerateError> {
    let previews = preview::load_session(pool, user_id, session_id).await?;
    let generation_type = previews[0].generation_type.clone();
    let original_prompt = previews[0].original_prompt.clone();

    // Feedback rounds are text-only; the original media is not re-sent.
    let prompt =
        regenerate_prompt(&generation_type, previews.len(), original_prompt.as_deref(), feedback);
    let response = genai
        .generate(&[Part::Text(prompt)], deck_params())
        .await?;
    let generated = parse_deck(&response)?;
    let cards = validate_cards(generated.cards)?;

    Ok(preview::replace_session(
        pool,
        user_id,
        session_id,
        &generated.title,
        generated.description.as_deref(),
        &cards,
        &generation_type,
        original_prompt.as_deref(),
    )
    .await?)
}

/// Transcribe an audio upload. Returns the model's text verbatim.
///
/// # Errors
///
/// Provider errors, or `ParseFailed` if the model returns nothing usable.
pub async fn transcribe(
    genai: &dyn GenerateText,
    mime_type: &str,
    data: Vec<u8>,
) -> Result<String, GenerateError> {
    let parts = [
        Part::Text(TRANSCRIBE_PROMPT.to_owned()),
        Part::InlineData { mime_type: mime_type.to_owned(), data },
    ];
    let text = genai.generate(&parts, transcribe_params()).await?;
    Ok(text)
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod tests;
