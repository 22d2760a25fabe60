// Generation module
// The language-model seam, prompt construction, and structured output extraction

pub mod prompt;
pub mod structured;

use thiserror::Error;

pub use structured::{ExtractionError, extract_json_array};

/// Typed failures of a generation call. No failure is ever reported as answer text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("request to language model failed: {0}")]
    Request(String),

    #[error("language model returned HTTP {0}")]
    Status(u16),

    #[error("malformed language model response: {0}")]
    MalformedResponse(String),

    #[error("language model returned an empty response")]
    EmptyResponse,
}

/// Sends a prompt to a language model and returns its text
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
