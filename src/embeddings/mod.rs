// Embeddings module
// Text chunking and the embedding seam used by ingestion and retrieval

pub mod chunking;

pub use chunking::{ChunkingConfig, ContentChunk, TextChunks, chunk_content, chunk_text};

/// Retrieval mode the text is embedded for.
///
/// Task-aware models embed documents and questions differently; the hint lets
/// the client route to the right mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    Document,
    Query,
}

/// Converts text into a fixed-dimension vector.
///
/// Implementations never fail loudly: any failure, and any empty input, yields
/// an empty vector. Callers must check for it before using the vector in a
/// similarity query.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str, task: EmbeddingTask) -> Vec<f32>;
}

/// True when `vector` can be compared against vectors of `dimension`
#[inline]
pub fn is_usable_embedding(vector: &[f32], dimension: usize) -> bool {
    !vector.is_empty() && vector.len() == dimension
}
