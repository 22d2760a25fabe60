use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{ChunkIndex, Database, VectorStore};
use crate::embeddings::{EmbeddingTask, Embedder};
use crate::extraction::{DocumentTextExtractor, TextExtractor};
use crate::generation::{GenerationError, Generator};
use crate::ollama::OllamaClient;
use crate::{Result, StudyError};

/// Everything an operation needs, built once at startup and never mutated.
///
/// Collaborators sit behind traits so tests can substitute fakes. The blocking
/// collaborators are driven through `spawn_blocking` by the helpers below.
#[derive(Clone)]
pub struct StudyContext {
    pub config: Arc<Config>,
    pub database: Database,
    pub chunk_index: Arc<dyn ChunkIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub extractor: Arc<dyn TextExtractor>,
}

impl std::fmt::Debug for StudyContext {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyContext")
            .field("base_dir", &self.config.base_dir)
            .field("dimension", &self.chunk_index.dimension())
            .finish_non_exhaustive()
    }
}

impl StudyContext {
    #[inline]
    pub fn new(
        config: Config,
        database: Database,
        chunk_index: Arc<dyn ChunkIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            database,
            chunk_index,
            embedder,
            generator,
            extractor,
        }
    }

    /// Open the stores under the configured base directory and connect the Ollama client
    #[inline]
    pub async fn initialize(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| StudyError::Config(e.to_string()))?;

        let database = Database::initialize_from_config_dir(config.get_base_dir())
            .await
            .map_err(StudyError::database)?;
        let vector_store = VectorStore::new(&config).await?;
        let ollama = Arc::new(
            OllamaClient::new(&config.ollama).map_err(|e| StudyError::Config(format!("{e:#}")))?,
        );

        info!(
            "Study context initialized at {}",
            config.get_base_dir().display()
        );

        Ok(Self::new(
            config,
            database,
            Arc::new(vector_store),
            ollama.clone(),
            ollama,
            Arc::new(DocumentTextExtractor::new()),
        ))
    }

    /// Dimension every stored and queried vector must have
    #[inline]
    pub fn embedding_dimension(&self) -> usize {
        self.chunk_index.dimension()
    }

    /// Embed off the async runtime; a panicked task yields the empty-vector sentinel
    #[inline]
    pub async fn embed(&self, text: String, task: EmbeddingTask) -> Vec<f32> {
        let embedder = Arc::clone(&self.embedder);
        tokio::task::spawn_blocking(move || embedder.embed(&text, task))
            .await
            .unwrap_or_else(|e| {
                warn!("Embedding task failed: {}", e);
                Vec::new()
            })
    }

    #[inline]
    pub async fn generate(&self, prompt: String) -> std::result::Result<String, GenerationError> {
        let generator = Arc::clone(&self.generator);
        tokio::task::spawn_blocking(move || generator.generate(&prompt))
            .await
            .unwrap_or_else(|e| Err(GenerationError::Request(format!("generation task failed: {e}"))))
    }

    /// Extract text off the async runtime; a panicked task yields empty text
    #[inline]
    pub async fn extract(&self, filename: String, bytes: Vec<u8>) -> String {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&filename, &bytes))
            .await
            .unwrap_or_else(|e| {
                warn!("Extraction task failed: {}", e);
                String::new()
            })
    }
}
