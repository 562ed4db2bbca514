//! Webhook intake — Stripe billing events and Clerk user events.
//!
//! DESIGN
//! ======
//! Webhooks are unauthenticated but signed. Each provider's raw body is
//! verified against its shared secret before any parsing happens, then the
//! event is handed to the billing service. Handlers always acknowledge with
//! `{"received": true}` on success so the provider stops retrying.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use serde_json::json;
use time::OffsetDateTime;

use crate::error::ApiError;
use crate::services::billing::{self, BillingError};
use crate::services::subscription::SubscriptionError;
use crate::state::AppState;

fn billing_error(e: BillingError) -> ApiError {
    match e {
        BillingError::MissingSecret => {
            tracing::error!("webhook secret not configured");
            ApiError::Internal("webhook not configured".into())
        }
        BillingError::InvalidSignature(msg) => {
            tracing::warn!(reason = %msg, "rejected webhook signature");
            ApiError::InvalidInput("invalid webhook signature".into())
        }
        BillingError::BadEvent(msg) => ApiError::InvalidInput(format!("malformed event: {msg}")),
        BillingError::Subscription(SubscriptionError::UnknownEmail(email)) => {
            tracing::error!(%email, "subscription event for unknown user");
            ApiError::Internal("subscription could not be applied".into())
        }
        BillingError::Subscription(SubscriptionError::Db(e)) | BillingError::Db(e) => {
            ApiError::from(e)
        }
    }
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Result<&'h str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidInput(format!("missing {name} header")))
}

fn secret_from_env(var: &str) -> Result<String, ApiError> {
    std::env::var(var).map_err(|_| billing_error(BillingError::MissingSecret))
}

pub async fn handle(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now = OffsetDateTime::now_utc();
    match provider.as_str() {
        "stripe" => {
            let secret = secret_from_env("STRIPE_WEBHOOK_SECRET")?;
            let signature = header(&headers, "stripe-signature")?;
            billing::verify_stripe_signature(&secret, signature, &body, now)
                .map_err(billing_error)?;
            billing::handle_stripe_event(&state.pool, &body).await.map_err(billing_error)?;
        }
        "clerk" => {
            let secret = secret_from_env("CLERK_WEBHOOK_SECRET")?;
            let msg_id = header(&headers, "svix-id")?;
            let timestamp = header(&headers, "svix-timestamp")?;
            let signature = header(&headers, "svix-signature")?;
            billing::verify_svix_signature(&secret, msg_id, timestamp, signature, &body, now)
                .map_err(billing_error)?;
            billing::handle_clerk_event(&state.pool, &body).await.map_err(billing_error)?;
        }
        other => {
            return Err(ApiError::InvalidInput(format!("unknown webhook provider: {other}")));
        }
    }
    Ok(Json(json!({ "received": true })))
}
