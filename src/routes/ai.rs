//! AI routes — generation, preview sessions, and transcription.
//!
//! DESIGN
//! ======
//! Generation and transcription accept multipart forms (`prompt`, `image`,
//! `audio`, `maxCards`, `deckOption`, `deckId`); confirm and regenerate take
//! JSON bodies keyed by session id. The handlers only classify and validate
//! input, then delegate to the `generate` service.

use axum::Json;
use axum::extract::{Extension, Multipart, State};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::genai::{GenAiError, GenerateText};
use crate::services::auth::CurrentUser;
use crate::services::generate::{
    self, DEFAULT_MAX_CARDS, GenInput, GenerateError, GeneratedDeckResponse,
};
use crate::services::preview::{CardPreview, PreviewError};
use crate::state::AppState;

use super::decks::deck_error;

// =============================================================================
// ERROR MAPPING
// =============================================================================

fn generate_error(e: GenerateError) -> ApiError {
    match e {
        GenerateError::MissingPrompt
        | GenerateError::UnsupportedMediaType(_)
        | GenerateError::FileTooLarge { .. }
        | GenerateError::BadCardCount => ApiError::InvalidInput(e.to_string()),
        GenerateError::NoProvider => {
            ApiError::StoreUnavailable("AI generation is not configured".into())
        }
        GenerateError::Provider(GenAiError::Timeout(_)) => {
            ApiError::Timeout("the model did not respond in time".into())
        }
        GenerateError::Provider(err) => {
            tracing::error!(error = %err, "generation provider error");
            ApiError::Internal("generation failed".into())
        }
        GenerateError::ParseFailed(msg) => {
            tracing::error!(error = %msg, "model returned unparseable output");
            ApiError::Internal("generation produced no usable output".into())
        }
        GenerateError::NoValidCards => {
            ApiError::UnprocessableContent("no valid cards were generated".into())
        }
        GenerateError::Deck(e) => deck_error(e),
        GenerateError::Preview(PreviewError::SessionNotFound(_)) => {
            ApiError::NotFound("preview session not found or expired".into())
        }
        GenerateError::Preview(PreviewError::Db(e)) | GenerateError::Db(e) => ApiError::from(e),
    }
}

fn provider(state: &AppState) -> Result<&dyn GenerateText, ApiError> {
    state
        .genai
        .as_deref()
        .ok_or_else(|| generate_error(GenerateError::NoProvider))
}

// =============================================================================
// MULTIPART PARSING
// =============================================================================

struct GenerateForm {
    input: GenInput,
    max_cards: usize,
    target_deck: Option<Uuid>,
}

async fn parse_generate_form(mut multipart: Multipart) -> Result<GenerateForm, ApiError> {
    let mut prompt = None;
    let mut image = None;
    let mut audio = None;
    let mut max_cards = DEFAULT_MAX_CARDS;
    let mut deck_option = None;
    let mut deck_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        let Some(name) = field.name().map(ToOwned::to_owned) else {
            continue;
        };
        match name.as_str() {
            "prompt" => prompt = Some(read_text(field).await?),
            "maxCards" => {
                let raw = read_text(field).await?;
                if let Ok(parsed) = raw.trim().parse::<usize>() {
                    max_cards = parsed;
                }
            }
            "deckOption" => deck_option = Some(read_text(field).await?),
            "deckId" => deck_id = Some(read_text(field).await?),
            "image" => image = Some(read_file(field).await?),
            "audio" => audio = Some(read_file(field).await?),
            _ => {}
        }
    }

    // An image upload wins over audio; plain text is the fallback.
    let input = if let Some((mime_type, data)) = image {
        generate::validate_image(&mime_type, data.len()).map_err(generate_error)?;
        GenInput::Image { mime_type, data }
    } else if let Some((mime_type, data)) = audio {
        generate::validate_audio(&mime_type, data.len(), false).map_err(generate_error)?;
        GenInput::Audio { mime_type, data }
    } else {
        let prompt = prompt.map(|p| p.trim().to_owned()).filter(|p| !p.is_empty());
        GenInput::Text {
            prompt: prompt.ok_or_else(|| generate_error(GenerateError::MissingPrompt))?,
        }
    };

    let target_deck = match (deck_option.as_deref(), deck_id.as_deref()) {
        (Some("new"), _) | (_, None | Some("")) => None,
        (_, Some(id)) => Some(
            id.parse::<Uuid>()
                .map_err(|_| ApiError::InvalidInput(format!("invalid deck id: {id}")))?,
        ),
    };

    Ok(GenerateForm { input, max_cards, target_deck })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("unreadable form field: {e}")))
}

async fn read_file(
    field: axum::extract::multipart::Field<'_>,
) -> Result<(String, Vec<u8>), ApiError> {
    let mime_type = field.content_type().unwrap_or("application/octet-stream").to_owned();
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("unreadable upload: {e}")))?;
    Ok((mime_type, data.to_vec()))
}

// =============================================================================
// GENERATION
// =============================================================================

pub async fn generate(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Json<GeneratedDeckResponse>, ApiError> {
    let genai = provider(&state)?;
    let form = parse_generate_form(multipart).await?;

    let outcome = generate::generate_direct(
        &state.pool,
        genai,
        user.id,
        form.input,
        form.max_cards,
        form.target_deck,
    )
    .await
    .map_err(generate_error)?;
    Ok(Json(outcome))
}

// =============================================================================
// PREVIEW SESSIONS
// =============================================================================

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub session_id: String,
    pub deck_title: String,
    pub deck_description: Option<String>,
    pub cards: Vec<PreviewCard>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, serde::Serialize)]
pub struct PreviewCard {
    pub front: String,
    pub back: String,
}

impl PreviewResponse {
    fn from_previews(previews: Vec<CardPreview>) -> Option<Self> {
        let first = previews.first()?;
        Some(Self {
            session_id: first.session_id.clone(),
            deck_title: first.deck_title.clone(),
            deck_description: first.deck_description.clone(),
            expires_at: first.expires_at,
            cards: previews
                .iter()
                .map(|p| PreviewCard { front: p.front.clone(), back: p.back.clone() })
                .collect(),
        })
    }
}

pub async fn preview(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>, ApiError> {
    let genai = provider(&state)?;
    let form = parse_generate_form(multipart).await?;

    let previews =
        generate::generate_preview(&state.pool, genai, user.id, form.input, form.max_cards)
            .await
            .map_err(generate_error)?;
    PreviewResponse::from_previews(previews)
        .map(Json)
        .ok_or_else(|| ApiError::Internal("preview session came back empty".into()))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub session_id: String,
    #[serde(default)]
    pub deck_id: Option<Uuid>,
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<GeneratedDeckResponse>, ApiError> {
    let outcome =
        generate::confirm_session(&state.pool, user.id, &body.session_id, body.deck_id)
            .await
            .map_err(generate_error)?;
    Ok(Json(outcome))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub session_id: String,
    pub feedback: String,
}

pub async fn regenerate(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<RegenerateRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let genai = provider(&state)?;
    if body.feedback.trim().is_empty() {
        return Err(ApiError::InvalidInput("feedback must not be empty".into()));
    }

    let previews = generate::regenerate_session(
        &state.pool,
        genai,
        user.id,
        &body.session_id,
        &body.feedback,
    )
    .await
    .map_err(generate_error)?;
    PreviewResponse::from_previews(previews)
        .map(Json)
        .ok_or_else(|| ApiError::Internal("preview session came back empty".into()))
}

// =============================================================================
// TRANSCRIPTION
// =============================================================================

#[derive(Debug, serde::Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

pub async fn transcribe(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let genai = provider(&state)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("audio") {
            upload = Some(read_file(field).await?);
        }
    }
    let (mime_type, data) =
        upload.ok_or_else(|| ApiError::InvalidInput("audio file is required".into()))?;
    generate::validate_audio(&mime_type, data.len(), true).map_err(generate_error)?;

    let text = generate::transcribe(genai, &mime_type, data).await.map_err(generate_error)?;
    Ok(Json(TranscribeResponse { text }))
}
