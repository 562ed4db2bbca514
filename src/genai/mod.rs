//! Generative AI adapter for card generation and transcription.
//!
//! DESIGN
//! ======
//! The service layer talks to [`GenerateText`], a provider-neutral trait.
//! [`GeminiClient`] is the production implementation; tests substitute mocks.
//! Callers supply the full prompt parts and per-call generation parameters,
//! so this module stays free of flashcard-specific knowledge.

pub mod gemini;
pub mod types;

pub use gemini::GeminiClient;
pub use types::{GenAiError, GenerateText, GenerationParams, Part};
