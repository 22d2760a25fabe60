// LanceDB vector database module
// Chunk embeddings and owner-scoped nearest-neighbour lookup


pub mod vector_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Same value as the chunk id in SQLite
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    pub document_id: String,
    /// Owner of the document; every similarity query is filtered on it
    pub user_id: String,
    /// The chunk text, so retrieval needs no second lookup
    pub content: String,
    pub chunk_index: u32,
    pub created_at: String,
}

/// Storage and lookup of chunk vectors.
///
/// All vectors in one index share a single dimension. Inserting a vector of
/// any other length is an error rather than a silent mix of model generations.
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    fn dimension(&self) -> usize;

    async fn insert_chunks(&self, records: Vec<EmbeddingRecord>) -> crate::Result<()>;

    async fn delete_document_chunks(&self, document_id: &str) -> crate::Result<()>;

    /// The `k` chunks owned by `user_id` closest to `vector`, ascending by distance
    async fn nearest_chunks(
        &self,
        user_id: &str,
        vector: &[f32],
        k: usize,
    ) -> crate::Result<Vec<SearchResult>>;
}
