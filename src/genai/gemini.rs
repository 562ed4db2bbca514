//! Gemini generateContent API client.
//!
//! Thin HTTP wrapper for `models/{model}:generateContent`. Request timeouts
//! vary per call (vision and long generations get a larger deadline), so the
//! deadline comes from [`GenerationParams`] rather than the client builder.
//! Pure parsing in `parse_response` for testability.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::types::{GenAiError, GenerationParams, Part};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Build a Gemini client from environment variables.
    ///
    /// - `GEMINI_API_KEY`: required API key
    /// - `GEMINI_MODEL`: model name (default `"gemini-2.0-flash"`)
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, GenAiError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| GenAiError::MissingApiKey { var: "GEMINI_API_KEY".into() })?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Self::new(api_key, model)
    }

    pub fn new(api_key: String, model: String) -> Result<Self, GenAiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GenAiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, model })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_inner(
        &self,
        parts: &[Part],
        params: GenerationParams,
    ) -> Result<String, GenAiError> {
        let body = build_request(parts, params);
        let url = format!("{API_BASE}/{}:generateContent", self.model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(params.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenAiError::Timeout(params.timeout)
                } else {
                    GenAiError::ApiRequest(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GenAiError::ApiRequest(e.to_string()))?;

        if status != 200 {
            return Err(GenAiError::ApiResponse { status, body: text });
        }

        parse_response(&text)
    }
}

#[async_trait::async_trait]
impl super::GenerateText for GeminiClient {
    async fn generate(
        &self,
        parts: &[Part],
        params: GenerationParams,
    ) -> Result<String, GenAiError> {
        self.generate_inner(parts, params).await
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(serde::Serialize)]
struct ApiRequest {
    contents: Vec<WireContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct WireContent {
    parts: Vec<WirePart>,
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(serde::Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(serde::Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(serde::Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(serde::Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// =============================================================================
// REQUEST BUILD / RESPONSE PARSE
// =============================================================================

fn build_request(parts: &[Part], params: GenerationParams) -> ApiRequest {
    let wire_parts = parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => WirePart::Text { text: text.clone() },
            Part::InlineData { mime_type, data } => WirePart::InlineData {
                inline_data: InlineData {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                },
            },
        })
        .collect();

    ApiRequest {
        contents: vec![WireContent { parts: wire_parts }],
        generation_config: GenerationConfig {
            temperature: params.temperature,
            max_output_tokens: params.max_output_tokens,
        },
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_response(json: &str) -> Result<String, GenAiError> {
    let api: ApiResponse =
        serde_json::from_str(json).map_err(|e| GenAiError::ApiParse(e.to_string()))?;

    let candidate = api
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenAiError::ApiParse("no candidates in response".into()))?;

    let text: String = candidate
        .content
        .into_iter()
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect();

    if text.is_empty() {
        return Err(GenAiError::ApiParse("no text in candidate".into()));
    }
    Ok(text)
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
