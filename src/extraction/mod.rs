
use std::path::Path;
use tracing::{debug, warn};

/// Document formats the extractor understands, by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
}

impl DocumentFormat {
    /// Detect the format from a filename's extension (case-insensitive)
    #[inline]
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Converts uploaded bytes into plain text.
///
/// Extraction never fails loudly. Unsupported formats and unreadable files
/// produce empty text, and ingestion continues with zero chunks.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, bytes: &[u8]) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentTextExtractor;

impl DocumentTextExtractor {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    fn extract_pdf(filename: &str, bytes: &[u8]) -> String {
        // pdf-extract panics on some malformed font tables
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Failed to extract text from PDF {}: {}", filename, e);
                String::new()
            }
            Err(_) => {
                warn!("PDF extraction panicked for {}", filename);
                String::new()
            }
        }
    }
}

impl TextExtractor for DocumentTextExtractor {
    #[inline]
    fn extract(&self, filename: &str, bytes: &[u8]) -> String {
        let text = match DocumentFormat::from_filename(filename) {
            Some(DocumentFormat::Pdf) => Self::extract_pdf(filename, bytes),
            Some(DocumentFormat::PlainText | DocumentFormat::Markdown) => {
                String::from_utf8_lossy(bytes).into_owned()
            }
            None => {
                warn!("Unsupported document format for {}, no text extracted", filename);
                String::new()
            }
        };

        debug!(
            "Extracted {} characters from {} ({} bytes)",
            text.chars().count(),
            filename,
            bytes.len()
        );
        text
    }
}
