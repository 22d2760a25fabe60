
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 1500;

/// Represents a chunk of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    /// The chunk text
    pub content: String,
    /// Position of this chunk within the document, starting at zero
    pub chunk_index: usize,
    /// Length of the chunk in Unicode code points
    pub char_count: usize,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in Unicode code points
    pub chunk_size: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Positional splitter over a string.
///
/// Yields contiguous, non-overlapping slices of at most `chunk_size` code points
/// that cover the input exactly once. Boundaries ignore sentences and paragraphs.
/// Cloning gives an independent cursor, so the sequence can be replayed.
#[derive(Debug, Clone)]
pub struct TextChunks<'a> {
    remaining: &'a str,
    chunk_size: usize,
}

impl<'a> Iterator for TextChunks<'a> {
    type Item = &'a str;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        let split_at = self
            .remaining
            .char_indices()
            .nth(self.chunk_size)
            .map_or(self.remaining.len(), |(byte_index, _)| byte_index);

        let (chunk, rest) = self.remaining.split_at(split_at);
        self.remaining = rest;
        Some(chunk)
    }
}

impl FusedIterator for TextChunks<'_> {}

/// Split `text` into chunks of at most `chunk_size` code points.
/// A `chunk_size` of zero is treated as one.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize) -> TextChunks<'_> {
    TextChunks {
        remaining: text,
        chunk_size: chunk_size.max(1),
    }
}

/// Chunk document text into owned, indexed pieces
#[inline]
pub fn chunk_content(text: &str, config: &ChunkingConfig) -> Vec<ContentChunk> {
    let chunks: Vec<ContentChunk> = chunk_text(text, config.chunk_size)
        .enumerate()
        .map(|(chunk_index, content)| ContentChunk {
            content: content.to_string(),
            chunk_index,
            char_count: content.chars().count(),
        })
        .collect();

    debug!(
        "Chunked {} characters into {} chunks (max {} per chunk)",
        text.chars().count(),
        chunks.len(),
        config.chunk_size
    );

    chunks
}
