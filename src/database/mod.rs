// Database module
// SQLite for documents, chat history and quizzes; LanceDB for chunk vectors

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::{ChunkIndex, ChunkMetadata, EmbeddingRecord, SearchResult, VectorStore};
pub use sqlite::*;
