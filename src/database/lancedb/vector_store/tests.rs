use crate::config::settings::OllamaConfig;

use super::*;
use tempfile::TempDir;

const DIMENSION: usize = 5;

async fn create_test_store() -> (VectorStore, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(&temp_dir.path().join("vectors"), DIMENSION)
        .await
        .expect("should create vector store");
    (store, temp_dir)
}

fn record(id: &str, document_id: &str, user_id: &str, offset: f32) -> EmbeddingRecord {
    let vector = (0..DIMENSION).map(|i| offset + i as f32 * 0.01).collect();

    EmbeddingRecord {
        id: id.to_string(),
        vector,
        metadata: ChunkMetadata {
            chunk_id: id.to_string(),
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            content: format!("content of {id}"),
            chunk_index: 0,
            created_at: "2024-01-01T00:00:00".to_string(),
        },
    }
}

fn query(offset: f32) -> Vec<f32> {
    (0..DIMENSION).map(|i| offset + i as f32 * 0.01).collect()
}

#[tokio::test]
async fn vector_store_initialization() {
    let (store, _temp_dir) = create_test_store().await;

    assert_eq!(store.table_name, TABLE_NAME);
    assert_eq!(store.dimension(), DIMENSION);
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
    assert!(store.validate_integrity().await);
}

#[tokio::test]
async fn store_from_config_uses_configured_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ollama: OllamaConfig {
            embedding_dimension: 64,
            ..OllamaConfig::default()
        },
        ..Config::default()
    };

    let store = VectorStore::new(&config)
        .await
        .expect("should create vector store");
    assert_eq!(store.dimension(), 64);
    assert!(config.vector_database_path().exists());
}

#[tokio::test]
async fn reopening_with_other_dimension_fails() {
    let (store, temp_dir) = create_test_store().await;
    store
        .insert_chunks(vec![record("a", "doc-1", "user-1", 0.1)])
        .await
        .expect("should insert");
    drop(store);

    let same = VectorStore::open(&temp_dir.path().join("vectors"), DIMENSION).await;
    assert!(same.is_ok(), "same dimension should reopen: {:?}", same.err());

    let other = VectorStore::open(&temp_dir.path().join("vectors"), DIMENSION + 1).await;
    assert!(matches!(other, Err(StudyError::Config(_))));
}

#[tokio::test]
async fn wrong_dimension_insert_is_rejected() {
    let (store, _temp_dir) = create_test_store().await;

    let mut bad = record("a", "doc-1", "user-1", 0.1);
    bad.vector.push(1.0);

    let result = store.insert_chunks(vec![bad]).await;
    assert!(matches!(result, Err(StudyError::Embedding(_))));
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);

    let result = store.nearest_chunks("user-1", &[0.1, 0.2], 3).await;
    assert!(matches!(result, Err(StudyError::Embedding(_))));
}

#[tokio::test]
async fn nearest_chunks_are_ordered_and_owner_scoped() {
    let (store, _temp_dir) = create_test_store().await;

    store
        .insert_chunks(vec![
            record("far", "doc-1", "user-1", 0.9),
            record("near", "doc-1", "user-1", 0.1),
            record("middle", "doc-2", "user-1", 0.5),
            record("foreign", "doc-3", "user-2", 0.1),
        ])
        .await
        .expect("should insert");

    let results = store
        .nearest_chunks("user-1", &query(0.1), 5)
        .await
        .expect("search should succeed");

    let ids: Vec<&str> = results
        .iter()
        .map(|r| r.chunk_metadata.chunk_id.as_str())
        .collect();
    assert_eq!(ids, vec!["near", "middle", "far"]);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(results[0].chunk_metadata.content, "content of near");

    let limited = store
        .nearest_chunks("user-1", &query(0.1), 1)
        .await
        .expect("search should succeed");
    assert_eq!(limited.len(), 1);

    let nobody = store
        .nearest_chunks("user-3", &query(0.1), 5)
        .await
        .expect("search should succeed");
    assert!(nobody.is_empty());
}

#[tokio::test]
async fn owner_filter_escapes_quotes() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .insert_chunks(vec![record("a", "doc-1", "o'brien", 0.1)])
        .await
        .expect("should insert");

    let results = store
        .nearest_chunks("o'brien", &query(0.1), 5)
        .await
        .expect("search should succeed");
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn delete_document_chunks_removes_only_that_document() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .insert_chunks(vec![
            record("a", "doc-1", "user-1", 0.1),
            record("b", "doc-1", "user-1", 0.2),
            record("c", "doc-2", "user-1", 0.3),
        ])
        .await
        .expect("should insert");

    store
        .delete_document_chunks("doc-1")
        .await
        .expect("delete should succeed");

    assert_eq!(store.count_embeddings().await.expect("should count"), 1);

    store.optimize().await.expect("optimize should succeed");
    assert_eq!(store.count_embeddings().await.expect("should count"), 1);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let (store, _temp_dir) = create_test_store().await;
    store
        .insert_chunks(Vec::new())
        .await
        .expect("empty insert should succeed");
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
}
