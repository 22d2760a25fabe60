//! Structured output extraction.
//!
//! Models often wrap JSON in prose or code fences, so the outermost array is
//! located by scanning for the first `[` and the last `]`. Strict JSON is still
//! required inside those delimiters. Callers go through [`extract_json_array`]
//! only, so a schema-constrained generation mode can replace it later.

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no JSON array found in model output")]
    NoJsonArray,

    #[error("model output is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("model output contained an empty array")]
    EmptyArray,
}

/// Parse the outermost JSON array in `raw` into a non-empty list of `T`
#[inline]
pub fn extract_json_array<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, ExtractionError> {
    let raw = raw.trim();

    let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) else {
        return Err(ExtractionError::NoJsonArray);
    };

    if end < start {
        return Err(ExtractionError::NoJsonArray);
    }

    let json = raw.get(start..=end).ok_or(ExtractionError::NoJsonArray)?;
    debug!("Extracted {} bytes of JSON from model output", json.len());

    let items: Vec<T> = serde_json::from_str(json)?;
    if items.is_empty() {
        return Err(ExtractionError::EmptyArray);
    }

    Ok(items)
}
