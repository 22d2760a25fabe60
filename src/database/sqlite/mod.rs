use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::quiz::UserAnswer;


pub mod models;
pub mod queries;

pub use models::*;
pub use queries::*;

pub type DbPool = Pool<Sqlite>;

/// Relational store for documents, chunk text, chat history and quizzes
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join("metadata.db")).await
    }

    // Document operations
    #[inline]
    pub async fn create_document(&self, user_id: &str, filename: &str) -> Result<Document> {
        let new_document = NewDocument {
            user_id: user_id.to_string(),
            filename: filename.to_string(),
        };
        DocumentQueries::create(&self.pool, &new_document).await
    }

    #[inline]
    pub async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        DocumentQueries::get_by_id(&self.pool, id).await
    }

    #[inline]
    pub async fn get_document_for_user(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<Document>> {
        DocumentQueries::get_for_user(&self.pool, user_id, id).await
    }

    #[inline]
    pub async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        DocumentQueries::list_for_user(&self.pool, user_id).await
    }

    #[inline]
    pub async fn mark_document_processed(&self, id: &str, chunk_count: i64) -> Result<()> {
        DocumentQueries::mark_processed(&self.pool, id, chunk_count).await
    }

    #[inline]
    pub async fn mark_document_failed(&self, id: &str, error_message: &str) -> Result<()> {
        DocumentQueries::mark_failed(&self.pool, id, error_message).await
    }

    #[inline]
    pub async fn update_document_summary(&self, id: &str, summary: &str) -> Result<NaiveDateTime> {
        DocumentQueries::update_summary(&self.pool, id, summary).await
    }

    // Raw text operations
    #[inline]
    pub async fn store_raw_text(&self, document_id: &str, user_id: &str, content: &str) -> Result<()> {
        DocumentRawQueries::upsert(&self.pool, document_id, user_id, content).await
    }

    #[inline]
    pub async fn get_raw_text(&self, document_id: &str) -> Result<Option<DocumentRaw>> {
        DocumentRawQueries::get(&self.pool, document_id).await
    }

    // Chunk operations
    #[inline]
    pub async fn upsert_chunks(&self, chunks: &[NewDocumentChunk]) -> Result<u64> {
        ChunkQueries::upsert_many(&self.pool, chunks).await
    }

    #[inline]
    pub async fn delete_document_chunks(&self, document_id: &str) -> Result<u64> {
        ChunkQueries::delete_for_document(&self.pool, document_id).await
    }

    #[inline]
    pub async fn list_document_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        ChunkQueries::list_for_document(&self.pool, document_id).await
    }

    // Chat operations
    #[inline]
    pub async fn insert_chat_message(&self, message: &NewChatMessage) -> Result<ChatMessage> {
        ChatQueries::create(&self.pool, message).await
    }

    #[inline]
    pub async fn list_chat_messages(&self, user_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
        ChatQueries::list_for_user(&self.pool, user_id, limit).await
    }

    // Quiz operations
    #[inline]
    pub async fn create_quiz(&self, new_quiz: &NewQuiz) -> Result<Quiz> {
        QuizQueries::create(&self.pool, new_quiz).await
    }

    #[inline]
    pub async fn get_quiz_for_user(&self, user_id: &str, id: &str) -> Result<Option<Quiz>> {
        QuizQueries::get_for_user(&self.pool, user_id, id).await
    }

    #[inline]
    pub async fn submit_quiz(
        &self,
        user_id: &str,
        id: &str,
        answers: &[UserAnswer],
        score: f64,
    ) -> Result<Option<NaiveDateTime>> {
        QuizQueries::submit(&self.pool, user_id, id, answers, score).await
    }

    #[inline]
    pub async fn list_quizzes(
        &self,
        user_id: &str,
        document_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Quiz>> {
        QuizQueries::list_for_user(&self.pool, user_id, document_id, limit).await
    }

    #[inline]
    pub async fn statistics(&self, user_id: &str) -> Result<StoreStatistics> {
        StatisticsQueries::for_user(&self.pool, user_id).await
    }

    /// Optimize database performance by running VACUUM and ANALYZE
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        info!("Optimizing database performance");

        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .context("Failed to vacuum database")?;

        sqlx::query("ANALYZE")
            .execute(&self.pool)
            .await
            .context("Failed to analyze database")?;

        debug!("Database optimization completed");
        Ok(())
    }
}
