// In-memory collaborators for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::config::Config;
use crate::context::StudyContext;
use crate::database::{ChunkIndex, Database, EmbeddingRecord, SearchResult};
use crate::embeddings::{EmbeddingTask, Embedder};
use crate::extraction::TextExtractor;
use crate::generation::{GenerationError, Generator};
use crate::{Result, StudyError};

pub const TEST_DIMENSION: usize = 8;

/// Deterministic embedder; texts containing `fail_marker` get the sentinel
#[derive(Debug, Default)]
pub struct FakeEmbedder {
    pub dimension: usize,
    pub fail_marker: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn failing_on(dimension: usize, marker: &str) -> Self {
        Self {
            dimension,
            fail_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }
}

impl Embedder for FakeEmbedder {
    fn embed(&self, text: &str, _task: EmbeddingTask) -> Vec<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if text.trim().is_empty() {
            return Vec::new();
        }
        if self
            .fail_marker
            .as_deref()
            .is_some_and(|marker| text.contains(marker))
        {
            return Vec::new();
        }

        let seed = text.chars().map(u32::from).fold(0_u32, u32::wrapping_add) % 97;
        (0..self.dimension)
            .map(|i| (seed as f32 + i as f32) / 100.0)
            .collect()
    }
}

/// Replays scripted replies in order and records every prompt
#[derive(Debug, Default)]
pub struct FakeGenerator {
    replies: Mutex<VecDeque<std::result::Result<String, GenerationError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok((*r).to_string())).collect()),
            ..Self::default()
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log poisoned").clone()
    }
}

impl Generator for FakeGenerator {
    fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());

        self.replies
            .lock()
            .expect("reply queue poisoned")
            .pop_front()
            .unwrap_or(Err(GenerationError::EmptyResponse))
    }
}

/// Returns the bytes as UTF-8, ignoring the filename
#[derive(Debug, Default)]
pub struct FakeExtractor;

impl TextExtractor for FakeExtractor {
    fn extract(&self, _filename: &str, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Brute-force L2 index that counts similarity queries
#[derive(Debug, Default)]
pub struct MemoryChunkIndex {
    pub dimension: usize,
    pub records: Mutex<Vec<EmbeddingRecord>>,
    pub searches: AtomicUsize,
    pub fail_inserts: bool,
}

impl MemoryChunkIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn failing_inserts(dimension: usize) -> Self {
        Self {
            dimension,
            fail_inserts: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("index poisoned").len()
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkIndex for MemoryChunkIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn insert_chunks(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if self.fail_inserts {
            return Err(StudyError::Database("vector store unavailable".to_string()));
        }
        if records.iter().any(|r| r.vector.len() != self.dimension) {
            return Err(StudyError::Embedding("dimension mismatch".to_string()));
        }
        self.records.lock().expect("index poisoned").extend(records);
        Ok(())
    }

    async fn delete_document_chunks(&self, document_id: &str) -> Result<()> {
        self.records
            .lock()
            .expect("index poisoned")
            .retain(|r| r.metadata.document_id != document_id);
        Ok(())
    }

    async fn nearest_chunks(
        &self,
        user_id: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.searches.fetch_add(1, Ordering::SeqCst);

        let mut results: Vec<SearchResult> = self
            .records
            .lock()
            .expect("index poisoned")
            .iter()
            .filter(|r| r.metadata.user_id == user_id)
            .map(|r| SearchResult {
                chunk_metadata: r.metadata.clone(),
                distance: r
                    .vector
                    .iter()
                    .zip(vector)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum(),
            })
            .collect();

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);
        Ok(results)
    }
}

pub struct TestHarness {
    pub context: StudyContext,
    pub embedder: Arc<FakeEmbedder>,
    pub generator: Arc<FakeGenerator>,
    pub index: Arc<MemoryChunkIndex>,
    _temp_dir: TempDir,
}

/// Context backed by a temporary SQLite database and in-memory fakes
pub async fn harness(
    embedder: FakeEmbedder,
    generator: FakeGenerator,
    index: MemoryChunkIndex,
) -> TestHarness {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("should create database");

    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };

    let embedder = Arc::new(embedder);
    let generator = Arc::new(generator);
    let index = Arc::new(index);

    let context = StudyContext::new(
        config,
        database,
        index.clone(),
        embedder.clone(),
        generator.clone(),
        Arc::new(FakeExtractor),
    );

    TestHarness {
        context,
        embedder,
        generator,
        index,
        _temp_dir: temp_dir,
    }
}

/// Harness with a working embedder and an empty index of [`TEST_DIMENSION`]
pub async fn default_harness(generator: FakeGenerator) -> TestHarness {
    harness(
        FakeEmbedder::new(TEST_DIMENSION),
        generator,
        MemoryChunkIndex::new(TEST_DIMENSION),
    )
    .await
}
