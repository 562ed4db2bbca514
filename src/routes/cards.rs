//! Card routes — updates, deletion, and review bookkeeping.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::auth::CurrentUser;
use crate::services::card::{self, Card};
use crate::state::AppState;

use super::decks::card_error;

#[derive(Debug, serde::Deserialize)]
pub struct UpdateCardRequest {
    pub front: Option<String>,
    pub back: Option<String>,
    pub hint: Option<String>,
}

pub async fn update_card(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
    Json(body): Json<UpdateCardRequest>,
) -> Result<Json<Card>, ApiError> {
    let card = card::update_card(
        &state.pool,
        card_id,
        user.id,
        body.front.as_deref(),
        body.back.as_deref(),
        body.hint.as_deref(),
    )
    .await
    .map_err(card_error)?;
    Ok(Json(card))
}

pub async fn delete_card(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    card::delete_card(&state.pool, card_id, user.id).await.map_err(card_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_learning(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
) -> Result<Json<Card>, ApiError> {
    let card = card::mark_learning(&state.pool, card_id, user.id).await.map_err(card_error)?;
    Ok(Json(card))
}
