//! Top-level API error taxonomy.
//!
//! DESIGN
//! ======
//! Service modules carry their own `thiserror` enums; handlers convert them
//! into `ApiError`, the single error-to-status mapper. Every error response
//! is a structured JSON object with a machine-readable `error` category and
//! a human-readable `message`. Store and provider failures never leak
//! internal identifiers to the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    UnprocessableContent(String),
    /// 429 with the quota body the frontend renders (plan + upgrade hint).
    #[error("{message}")]
    RateLimited {
        message: String,
        retry_after: i64,
        current_plan: String,
        upgrade_message: String,
    },
    #[error("{0}")]
    StoreUnavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::UnprocessableContent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
            Self::UnprocessableContent(_) => "unprocessable_content",
            Self::RateLimited { .. } => "rate_limited",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::RateLimited { message, retry_after, current_plan, upgrade_message } => json!({
                "error": self.category(),
                "message": message,
                "retryAfter": retry_after,
                "currentPlan": current_plan,
                "upgradeMessage": upgrade_message,
            }),
            other => json!({
                "error": other.category(),
                "message": other.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database error");
        Self::Internal("database error".into())
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
