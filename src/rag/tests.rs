use super::*;
use crate::database::ChunkMetadata;
use crate::generation::GenerationError;
use crate::ingestion::IngestionPipeline;
use crate::test_support::{
    FakeEmbedder, FakeGenerator, MemoryChunkIndex, TEST_DIMENSION, default_harness, harness,
};

fn result(content: &str, distance: f32) -> SearchResult {
    SearchResult {
        chunk_metadata: ChunkMetadata {
            chunk_id: format!("chunk-{content}"),
            document_id: "doc-1".to_string(),
            user_id: "user-1".to_string(),
            content: content.to_string(),
            chunk_index: 0,
            created_at: "2024-01-01 00:00:00".to_string(),
        },
        distance,
    }
}

#[test]
fn context_joins_in_rank_order() {
    let results = vec![result("first", 0.1), result("second", 0.2), result("third", 0.3)];
    assert_eq!(
        assemble_context(&results),
        "first\n\n---\n\nsecond\n\n---\n\nthird"
    );
}

#[test]
fn context_of_nothing_is_empty() {
    assert_eq!(assemble_context(&[]), "");
    assert_eq!(assemble_context(&[result("only", 0.0)]), "only");
}

#[tokio::test]
async fn answer_is_grounded_and_logged() {
    let harness = default_harness(FakeGenerator::replying(&["ATP is the energy currency."])).await;
    IngestionPipeline::new(harness.context.clone())
        .ingest(
            "user-1",
            "bio.txt",
            b"Mitochondria produce ATP for the cell.".to_vec(),
        )
        .await
        .expect("ingestion should succeed");

    let service = ChatService::new(harness.context.clone());
    let answer = service
        .ask("user-1", "  What produces ATP?  ")
        .await
        .expect("ask should succeed");

    assert_eq!(answer.answer, "ATP is the energy currency.");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(harness.index.search_count(), 1);

    let prompts = harness.generator.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Mitochondria produce ATP for the cell."));
    assert!(prompts[0].contains("Question: What produces ATP?"));

    let history = service.history("user-1", 10).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, answer.message_id);
    assert_eq!(history[0].question, "What produces ATP?");
    assert_eq!(history[0].sources(), answer.sources.as_slice());
}

#[tokio::test]
async fn retrieval_is_scoped_to_the_asking_user() {
    let harness = default_harness(FakeGenerator::replying(&["No idea."])).await;
    IngestionPipeline::new(harness.context.clone())
        .ingest("user-2", "secret.txt", b"Someone else's notes.".to_vec())
        .await
        .expect("ingestion should succeed");

    let answer = ChatService::new(harness.context.clone())
        .ask("user-1", "What do the notes say?")
        .await
        .expect("ask should succeed");

    assert!(answer.sources.is_empty());
    assert!(!harness.generator.prompts()[0].contains("Someone else's notes."));
}

#[tokio::test]
async fn sentinel_query_embedding_skips_similarity_search() {
    let harness = harness(
        FakeEmbedder::failing_on(TEST_DIMENSION, "?"),
        FakeGenerator::replying(&["I could not find that in your material."]),
        MemoryChunkIndex::new(TEST_DIMENSION),
    )
    .await;

    let answer = ChatService::new(harness.context.clone())
        .ask("user-1", "What is osmosis?")
        .await
        .expect("ask should still answer");

    assert_eq!(harness.index.search_count(), 0);
    assert!(answer.sources.is_empty());
    assert!(harness.generator.prompts()[0].contains("no study material matched"));
}

#[tokio::test]
async fn wrong_dimension_query_embedding_skips_similarity_search() {
    let harness = harness(
        FakeEmbedder::new(TEST_DIMENSION * 2),
        FakeGenerator::replying(&["Answer."]),
        MemoryChunkIndex::new(TEST_DIMENSION),
    )
    .await;

    ChatService::new(harness.context.clone())
        .ask("user-1", "What is osmosis?")
        .await
        .expect("ask should still answer");

    assert_eq!(harness.index.search_count(), 0);
}

#[tokio::test]
async fn generation_failure_is_an_error_and_not_logged() {
    let harness = default_harness(FakeGenerator::failing(GenerationError::Status(500))).await;
    let service = ChatService::new(harness.context.clone());

    let result = service.ask("user-1", "What is osmosis?").await;
    assert!(matches!(
        result,
        Err(StudyError::Generation(GenerationError::Status(500)))
    ));

    assert!(service.history("user-1", 10).await.expect("history").is_empty());
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let harness = default_harness(FakeGenerator::default()).await;
    let service = ChatService::new(harness.context.clone());

    let result = service.ask("user-1", "   ").await;
    assert!(matches!(result, Err(StudyError::Validation(_))));
    assert!(harness.generator.prompts().is_empty());
}
