use super::*;
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;

async fn create_test_pool() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_path)
                .create_if_missing(true)
                .foreign_keys(true),
        )
        .await
        .expect("Failed to create test pool");

    sqlx::raw_sql(include_str!("../migrations/001_initial_schema.sql"))
        .execute(&pool)
        .await
        .expect("Failed to run migrations");

    (temp_dir, pool)
}

#[tokio::test]
async fn unknown_ids_return_none() {
    let (_temp_dir, pool) = create_test_pool().await;

    assert!(
        DocumentQueries::get_by_id(&pool, "missing")
            .await
            .expect("query should succeed")
            .is_none()
    );
    assert!(
        DocumentRawQueries::get(&pool, "missing")
            .await
            .expect("query should succeed")
            .is_none()
    );
    assert!(
        QuizQueries::get_for_user(&pool, "user-1", "missing")
            .await
            .expect("query should succeed")
            .is_none()
    );
}

#[tokio::test]
async fn summary_update_sets_timestamp() {
    let (_temp_dir, pool) = create_test_pool().await;
    let document = DocumentQueries::create(
        &pool,
        &NewDocument {
            user_id: "user-1".to_string(),
            filename: "notes.txt".to_string(),
        },
    )
    .await
    .expect("Failed to create document");
    assert!(document.summary.is_none());

    let generated_at = DocumentQueries::update_summary(&pool, &document.id, "A short summary.")
        .await
        .expect("Failed to update summary");

    let updated = DocumentQueries::get_by_id(&pool, &document.id)
        .await
        .expect("Failed to get document")
        .expect("Document should exist");
    assert_eq!(updated.summary.as_deref(), Some("A short summary."));
    assert_eq!(updated.summary_generated_at, Some(generated_at));
}

#[tokio::test]
async fn chunks_require_existing_document() {
    let (_temp_dir, pool) = create_test_pool().await;

    let orphan = NewDocumentChunk {
        id: "chunk-1".to_string(),
        document_id: "missing".to_string(),
        user_id: "user-1".to_string(),
        chunk_index: 0,
        chunk_text: "text".to_string(),
    };

    assert!(ChunkQueries::upsert_many(&pool, &[orphan]).await.is_err());
    assert_eq!(
        ChunkQueries::upsert_many(&pool, &[])
            .await
            .expect("empty batch should succeed"),
        0
    );
}

#[tokio::test]
async fn status_check_constraint_rejects_unknown_values() {
    let (_temp_dir, pool) = create_test_pool().await;
    let document = DocumentQueries::create(
        &pool,
        &NewDocument {
            user_id: "user-1".to_string(),
            filename: "notes.txt".to_string(),
        },
    )
    .await
    .expect("Failed to create document");

    let result = sqlx::query("UPDATE documents SET status = 'indexing' WHERE id = ?")
        .bind(&document.id)
        .execute(&pool)
        .await;
    assert!(result.is_err());
}
