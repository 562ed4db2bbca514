//! Deck routes — CRUD, cards within a deck, stats, and answers.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::auth::CurrentUser;
use crate::services::card::{self, Card, CardError};
use crate::services::deck::{self, Deck, DeckError};
use crate::services::stats::{self, DeckStats, StatsError};
use crate::state::AppState;

// =============================================================================
// ERROR MAPPING
// =============================================================================

pub(crate) fn deck_error(e: DeckError) -> ApiError {
    match e {
        DeckError::NotFound(id) => ApiError::NotFound(format!("deck {id} not found")),
        DeckError::Forbidden(_) => ApiError::Forbidden("you do not own this deck".into()),
        DeckError::EmptyTitle => ApiError::InvalidInput("title must not be empty".into()),
        DeckError::Db(e) => ApiError::from(e),
    }
}

pub(crate) fn card_error(e: CardError) -> ApiError {
    match e {
        CardError::NotFound(id) => ApiError::NotFound(format!("card {id} not found")),
        CardError::Deck(e) => deck_error(e),
        CardError::EmptyField => {
            ApiError::InvalidInput("front and back must not be empty".into())
        }
        CardError::Db(e) => ApiError::from(e),
    }
}

fn stats_error(e: StatsError) -> ApiError {
    match e {
        StatsError::Deck(e) => deck_error(e),
        StatsError::Db(e) => ApiError::from(e),
    }
}

// =============================================================================
// DECK CRUD
// =============================================================================

#[derive(Debug, serde::Deserialize)]
pub struct CreateDeckRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct UpdateDeckRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

pub async fn create_deck(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateDeckRequest>,
) -> Result<(StatusCode, Json<Deck>), ApiError> {
    let deck = deck::create_deck(&state.pool, user.id, &body.title, body.description.as_deref())
        .await
        .map_err(deck_error)?;
    Ok((StatusCode::CREATED, Json(deck)))
}

pub async fn list_decks(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<Deck>>, ApiError> {
    let decks = deck::list_decks(&state.pool, user.id).await.map_err(deck_error)?;
    Ok(Json(decks))
}

pub async fn get_deck(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(deck_id): Path<Uuid>,
) -> Result<Json<Deck>, ApiError> {
    let deck = deck::get_deck(&state.pool, deck_id, user.id).await.map_err(deck_error)?;
    Ok(Json(deck))
}

pub async fn update_deck(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(deck_id): Path<Uuid>,
    Json(body): Json<UpdateDeckRequest>,
) -> Result<Json<Deck>, ApiError> {
    let deck = deck::update_deck(
        &state.pool,
        deck_id,
        user.id,
        body.title.as_deref(),
        body.description.as_deref(),
    )
    .await
    .map_err(deck_error)?;
    Ok(Json(deck))
}

pub async fn delete_deck(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(deck_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    deck::delete_deck(&state.pool, deck_id, user.id).await.map_err(deck_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// CARDS WITHIN A DECK
// =============================================================================

#[derive(Debug, serde::Deserialize)]
pub struct CreateCardRequest {
    pub front: String,
    pub back: String,
    pub hint: Option<String>,
}

pub async fn create_card(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(deck_id): Path<Uuid>,
    Json(body): Json<CreateCardRequest>,
) -> Result<(StatusCode, Json<Card>), ApiError> {
    let card = card::create_card(
        &state.pool,
        deck_id,
        user.id,
        &body.front,
        &body.back,
        body.hint.as_deref(),
    )
    .await
    .map_err(card_error)?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn list_cards(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(deck_id): Path<Uuid>,
) -> Result<Json<Vec<Card>>, ApiError> {
    let cards = card::list_cards(&state.pool, deck_id, user.id).await.map_err(card_error)?;
    Ok(Json(cards))
}

// =============================================================================
// STATS AND ANSWERS
// =============================================================================

pub async fn deck_stats(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(deck_id): Path<Uuid>,
) -> Result<Json<DeckStats>, ApiError> {
    let stats = stats::deck_stats(&state.pool, deck_id, user.id).await.map_err(stats_error)?;
    Ok(Json(stats))
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub is_correct: bool,
    #[serde(default)]
    pub study_time: i32,
}

pub async fn record_answer(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path((deck_id, card_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<Card>, ApiError> {
    if body.study_time < 0 {
        return Err(ApiError::InvalidInput("studyTime must not be negative".into()));
    }
    let card = card::record_answer(
        &state.pool,
        deck_id,
        card_id,
        user.id,
        body.is_correct,
        body.study_time,
    )
    .await
    .map_err(card_error)?;
    Ok(Json(card))
}
