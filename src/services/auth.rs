//! Clerk authentication — token verification, user lookup, auth middleware.
//!
//! DESIGN
//! ======
//! Handlers never see raw tokens. The auth middleware extracts the bearer
//! token, verifies it through the [`TokenVerifier`] trait, resolves the user
//! row by Clerk subject id, and stores a [`CurrentUser`] in request
//! extensions. The production verifier confirms the session against the
//! Clerk backend API; tests substitute a static verifier.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const CLERK_API_BASE: &str = "https://api.clerk.com/v1";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token rejected: {0}")]
    InvalidToken(String),
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Identity attested by the token verifier.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub clerk_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// The authenticated caller, resolved to a `users` row.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub clerk_id: String,
}

/// Verifies bearer tokens. Mockable seam for handler tests.
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns an [`AuthError`] if the token is malformed, expired, or the
    /// provider rejects it.
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

// =============================================================================
// CLERK VERIFIER
// =============================================================================

/// Session-token claims we read from the JWT payload. The signature is not
/// checked locally; the session is confirmed against the Clerk API instead.
#[derive(Debug, serde::Deserialize)]
pub struct TokenClaims {
    /// Subject: the Clerk user id.
    pub sub: String,
    /// Session id.
    pub sid: String,
}

#[derive(Debug, serde::Deserialize)]
struct SessionResponse {
    status: String,
    user_id: String,
}

pub struct ClerkVerifier {
    http: reqwest::Client,
    secret_key: String,
}

impl ClerkVerifier {
    /// Build a verifier from `CLERK_SECRET_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or the HTTP client fails.
    pub fn from_env() -> Result<Self, AuthError> {
        let secret_key = std::env::var("CLERK_SECRET_KEY")
            .map_err(|_| AuthError::Provider("CLERK_SECRET_KEY not set".into()))?;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Provider(e.to_string()))?;
        Ok(Self { http, secret_key })
    }
}

#[async_trait::async_trait]
impl TokenVerifier for ClerkVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let claims = decode_claims(token)?;

        let session: SessionResponse = self
            .http
            .get(format!("{CLERK_API_BASE}/sessions/{}", claims.sid))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if session.status != "active" || session.user_id != claims.sub {
            return Err(AuthError::InvalidToken("session not active".into()));
        }

        Ok(VerifiedIdentity { clerk_id: claims.sub, email: None, name: None })
    }
}

/// Decode the payload segment of a JWT without verifying the signature.
///
/// # Errors
///
/// Returns `AuthError::InvalidToken` for anything that is not a three-part
/// token with a JSON payload carrying `sub` and `sid`.
pub fn decode_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(AuthError::InvalidToken("not a JWT".into())),
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::InvalidToken("payload not base64".into()))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::InvalidToken("payload not JSON".into()))
}

// =============================================================================
// USER LOOKUP
// =============================================================================

/// Resolve a verified Clerk subject to its user row.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_user_by_clerk_id(
    pool: &PgPool,
    clerk_id: &str,
) -> Result<Option<Uuid>, AuthError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM users WHERE clerk_id = $1 AND deleted_at IS NULL",
    )
    .bind(clerk_id)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Authenticate the request and attach [`CurrentUser`] to its extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".into()))?;

    let identity = state.verifier.verify(&token).await.map_err(|e| match e {
        AuthError::Db(err) => ApiError::from(err),
        AuthError::Provider(msg) => {
            tracing::error!(error = %msg, "identity provider unreachable");
            ApiError::Unauthorized("could not verify token".into())
        }
        other => ApiError::Unauthorized(other.to_string()),
    })?;

    let user_id = find_user_by_clerk_id(&state.pool, &identity.clerk_id)
        .await
        .map_err(|e| match e {
            AuthError::Db(err) => ApiError::from(err),
            other => ApiError::Unauthorized(other.to_string()),
        })?
        .ok_or_else(|| ApiError::Unauthorized("unknown user".into()))?;

    request
        .extensions_mut()
        .insert(CurrentUser { id: user_id, clerk_id: identity.clerk_id });
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    let header = request.headers().get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
