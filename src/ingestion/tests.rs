use super::*;
use crate::database::DocumentStatus;
use crate::test_support::{
    FakeEmbedder, FakeGenerator, MemoryChunkIndex, TEST_DIMENSION, default_harness, harness,
};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn document_is_chunked_embedded_and_stored() {
    let harness = default_harness(FakeGenerator::default()).await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let report = pipeline
        .ingest("user-1", "cells.txt", "a".repeat(3000).into_bytes())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.chunks_total, 2);
    assert_eq!(report.chunks_stored, 2);
    assert_eq!(report.chunks_skipped, 0);
    assert_eq!(report.document.status, DocumentStatus::Processed);
    assert_eq!(report.document.chunk_count, 2);

    let rows = harness
        .context
        .database
        .list_document_chunks(&report.document.id)
        .await
        .expect("should list chunks");
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.chunk_text.chars().count() == 1500));
    assert_eq!(harness.index.len(), 2);
    assert_eq!(harness.embedder.calls.load(Ordering::SeqCst), 2);

    let raw = harness
        .context
        .database
        .get_raw_text(&report.document.id)
        .await
        .expect("should read raw text")
        .expect("raw text should exist");
    assert_eq!(raw.content.len(), 3000);
}

#[tokio::test]
async fn chunk_order_survives_concurrent_embedding() {
    let harness = default_harness(FakeGenerator::default()).await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let text: String = ('a'..='j').map(|c| c.to_string().repeat(1500)).collect();
    let report = pipeline
        .ingest("user-1", "letters.txt", text.into_bytes())
        .await
        .expect("ingestion should succeed");

    let rows = harness
        .context
        .database
        .list_document_chunks(&report.document.id)
        .await
        .expect("should list chunks");
    let firsts: String = rows
        .iter()
        .filter_map(|r| r.chunk_text.chars().next())
        .collect();
    assert_eq!(firsts, "abcdefghij");
}

#[tokio::test]
async fn sentinel_embeddings_are_skipped() {
    let harness = harness(
        FakeEmbedder::failing_on(TEST_DIMENSION, "b"),
        FakeGenerator::default(),
        MemoryChunkIndex::new(TEST_DIMENSION),
    )
    .await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let text = format!("{}{}{}", "a".repeat(1500), "b".repeat(1500), "c".repeat(10));
    let report = pipeline
        .ingest("user-1", "notes.txt", text.into_bytes())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.chunks_total, 3);
    assert_eq!(report.chunks_stored, 2);
    assert_eq!(report.chunks_skipped, 1);
    assert_eq!(report.document.chunk_count, 2);
    assert_eq!(harness.index.len(), 2);

    let indices: Vec<i64> = harness
        .context
        .database
        .list_document_chunks(&report.document.id)
        .await
        .expect("should list chunks")
        .iter()
        .map(|r| r.chunk_index)
        .collect();
    assert_eq!(indices, vec![0, 2]);
}

#[tokio::test]
async fn wrong_dimension_embeddings_are_skipped() {
    let harness = harness(
        FakeEmbedder::new(TEST_DIMENSION + 1),
        FakeGenerator::default(),
        MemoryChunkIndex::new(TEST_DIMENSION),
    )
    .await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let report = pipeline
        .ingest("user-1", "notes.txt", b"short text".to_vec())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.chunks_stored, 0);
    assert_eq!(report.chunks_skipped, 1);
    assert_eq!(report.document.status, DocumentStatus::Processed);
    assert_eq!(harness.index.len(), 0);
}

#[tokio::test]
async fn empty_text_is_processed_with_zero_chunks() {
    let harness = default_harness(FakeGenerator::default()).await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let report = pipeline
        .ingest("user-1", "empty.txt", Vec::new())
        .await
        .expect("ingestion should succeed");

    assert_eq!(report.chunks_total, 0);
    assert_eq!(report.document.status, DocumentStatus::Processed);
    assert_eq!(harness.embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn store_failure_marks_document_failed_and_cleans_up() {
    let harness = harness(
        FakeEmbedder::new(TEST_DIMENSION),
        FakeGenerator::default(),
        MemoryChunkIndex::failing_inserts(TEST_DIMENSION),
    )
    .await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let result = pipeline
        .ingest("user-1", "notes.txt", "x".repeat(2000).into_bytes())
        .await;
    assert!(matches!(result, Err(StudyError::Database(_))));

    let documents = harness
        .context
        .database
        .list_documents("user-1")
        .await
        .expect("should list documents");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].status, DocumentStatus::Failed);
    assert!(
        documents[0]
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("vector store unavailable"))
    );

    let rows = harness
        .context
        .database
        .list_document_chunks(&documents[0].id)
        .await
        .expect("should list chunks");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn reprocess_does_not_duplicate_chunks() {
    let harness = default_harness(FakeGenerator::default()).await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let report = pipeline
        .ingest("user-1", "notes.txt", "z".repeat(3100).into_bytes())
        .await
        .expect("ingestion should succeed");
    assert_eq!(report.chunks_stored, 3);

    let rerun = pipeline
        .reprocess("user-1", &report.document.id)
        .await
        .expect("reprocess should succeed");
    assert_eq!(rerun.chunks_stored, 3);
    assert_eq!(harness.index.len(), 3);

    let rows = harness
        .context
        .database
        .list_document_chunks(&report.document.id)
        .await
        .expect("should list chunks");
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn reprocess_checks_ownership() {
    let harness = default_harness(FakeGenerator::default()).await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let report = pipeline
        .ingest("user-1", "notes.txt", b"some notes".to_vec())
        .await
        .expect("ingestion should succeed");

    let result = pipeline.reprocess("user-2", &report.document.id).await;
    assert!(matches!(result, Err(StudyError::NotFound { .. })));

    let result = pipeline.reprocess("user-1", "missing").await;
    assert!(matches!(result, Err(StudyError::NotFound { .. })));
}

#[tokio::test]
async fn blank_identifiers_are_rejected() {
    let harness = default_harness(FakeGenerator::default()).await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let result = pipeline.ingest(" ", "notes.txt", Vec::new()).await;
    assert!(matches!(result, Err(StudyError::Validation(_))));

    let result = pipeline.ingest("user-1", "", Vec::new()).await;
    assert!(matches!(result, Err(StudyError::Validation(_))));
}

#[tokio::test]
async fn documents_are_listed_per_owner() {
    let harness = default_harness(FakeGenerator::default()).await;
    let pipeline = IngestionPipeline::new(harness.context.clone());

    let first = pipeline
        .ingest("user-1", "first.txt", b"first".to_vec())
        .await
        .expect("ingestion should succeed");
    let second = pipeline
        .ingest("user-1", "second.txt", b"second".to_vec())
        .await
        .expect("ingestion should succeed");
    pipeline
        .ingest("user-2", "other.txt", b"other".to_vec())
        .await
        .expect("ingestion should succeed");

    let documents = pipeline.list_documents("user-1").await.expect("list");
    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, [second.document.id.as_str(), first.document.id.as_str()]);

    let fetched = pipeline
        .get_document("user-1", &first.document.id)
        .await
        .expect("document exists");
    assert_eq!(fetched.filename, "first.txt");

    assert!(matches!(
        pipeline.get_document("user-2", &first.document.id).await,
        Err(StudyError::NotFound { entity: "document", .. })
    ));
    assert!(matches!(
        pipeline.get_document("user-1", "missing").await,
        Err(StudyError::NotFound { .. })
    ));
}
