//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool plus the three external seams of the service:
//! the identity verifier, the generative-AI client, and the quota store.
//! The latter two are optional. When the corresponding env vars are missing
//! the server still boots and the dependent routes degrade gracefully.

use std::sync::Arc;

use sqlx::PgPool;

use crate::genai::GenerateText;
use crate::quota::QuotaOps;
use crate::services::auth::TokenVerifier;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum. All inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Verifies bearer tokens against the identity provider.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Optional generation client. `None` if GEMINI_API_KEY is not configured.
    pub genai: Option<Arc<dyn GenerateText>>,
    /// Optional quota store. `None` if REDIS_URL is not configured; quota
    /// middleware then rejects AI requests rather than admitting unmetered.
    pub quota: Option<Arc<dyn QuotaOps>>,
}

impl AppState {
    #[must_use]
    pub fn new(
        pool: PgPool,
        verifier: Arc<dyn TokenVerifier>,
        genai: Option<Arc<dyn GenerateText>>,
        quota: Option<Arc<dyn QuotaOps>>,
    ) -> Self {
        Self { pool, verifier, genai, quota }
    }
}
