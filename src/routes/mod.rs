//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Three route tiers share one Axum router: public (health, webhooks, where
//! the signature is the auth), authenticated CRUD, and AI routes that
//! additionally pass the plan quota middleware. Middleware layering puts
//! auth outside quota so the quota check always sees a resolved user.

pub mod ai;
pub mod cards;
pub mod decks;
pub mod webhooks;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::{Json, Router, middleware};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::rate_limit::quota_middleware;
use crate::services::auth::require_auth;
use crate::services::generate::MAX_AUDIO_BYTES;
use crate::state::AppState;

const WEBHOOK_BODY_LIMIT: usize = 64 * 1024;
// Largest accepted upload plus multipart framing overhead.
const UPLOAD_BODY_LIMIT: usize = MAX_AUDIO_BYTES + 1024 * 1024;

#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let generate_routes = Router::new()
        .route("/api/cards/ai_generate", post(ai::generate))
        .route("/api/cards/ai_preview", post(ai::preview))
        .route("/api/cards/ai_confirm", post(ai::confirm))
        .route("/api/cards/ai_regenerate", post(ai::regenerate))
        .layer(middleware::from_fn_with_state(
            (state.clone(), "ai_generate"),
            quota_middleware,
        ));

    let transcribe_routes = Router::new()
        .route("/api/audio/transcribe", post(ai::transcribe))
        .layer(middleware::from_fn_with_state(
            (state.clone(), "audio_transcribe"),
            quota_middleware,
        ));

    let authed = Router::new()
        .route("/api/decks", post(decks::create_deck).get(decks::list_decks))
        .route(
            "/api/decks/{deck_id}",
            get(decks::get_deck).put(decks::update_deck).delete(decks::delete_deck),
        )
        .route("/api/decks/{deck_id}/stats", get(decks::deck_stats))
        .route(
            "/api/decks/{deck_id}/cards",
            post(decks::create_card).get(decks::list_cards),
        )
        .route("/api/decks/{deck_id}/cards/{card_id}/answer", post(decks::record_answer))
        .route("/api/cards/{card_id}", put(cards::update_card).delete(cards::delete_card))
        .route("/api/cards/{card_id}/learning", post(cards::mark_learning))
        .merge(generate_routes)
        .merge(transcribe_routes)
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/webhook/{provider}",
            post(webhooks::handle).layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)),
        )
        .merge(authed)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
