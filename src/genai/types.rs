//! Provider-neutral generation types and errors.
//!
//! Shared by the Gemini client and by test mocks. A request is a list of
//! parts (text plus optional inline media) with per-call generation
//! parameters, and the response is a single concatenated text.

use std::time::Duration;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by generation client operations.
#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The request exceeded its deadline.
    #[error("API request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The provider response body could not be deserialized or held no text.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// REQUEST PARTS
// =============================================================================

/// One part of a generation request.
#[derive(Debug, Clone)]
pub enum Part {
    /// A plain text prompt segment.
    Text(String),
    /// Inline binary media, base64-encoded by the wire layer.
    InlineData { mime_type: String, data: Vec<u8> },
}

/// Per-call generation parameters.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

// =============================================================================
// GENERATE TRAIT
// =============================================================================

/// Provider-neutral async trait for text generation. Enables mocking in tests.
#[async_trait::async_trait]
pub trait GenerateText: Send + Sync {
    /// Send a generation request and return the concatenated response text.
    ///
    /// # Errors
    ///
    /// Returns a [`GenAiError`] if the request fails, times out, or the
    /// response contains no text.
    async fn generate(&self, parts: &[Part], params: GenerationParams)
    -> Result<String, GenAiError>;
}
