#[cfg(test)]
mod tests;

use super::models::*;
use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use sqlx::SqlitePool;
use sqlx::types::Json;
use tracing::debug;
use uuid::Uuid;

use crate::quiz::UserAnswer;

const DOCUMENT_COLUMNS: &str = "id, user_id, filename, status, summary, summary_generated_at, \
     chunk_count, error_message, upload_date";

const QUIZ_COLUMNS: &str = "id, user_id, document_id, questions, total_questions, score, answers, \
     status, attempted_at, created_at";

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_document: &NewDocument) -> Result<Document> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO documents (id, user_id, filename, status, upload_date) \
             VALUES (?, ?, ?, 'uploaded', ?)",
        )
        .bind(&id)
        .bind(&new_document.user_id)
        .bind(&new_document.filename)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create document")?;

        Self::get_by_id(pool, &id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created document"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document by id")?;

        Ok(document)
    }

    /// Fetch a document only when it belongs to `user_id`
    #[inline]
    pub async fn get_for_user(
        pool: &SqlitePool,
        user_id: &str,
        id: &str,
    ) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get document for user")?;

        Ok(document)
    }

    #[inline]
    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = ? \
             ORDER BY upload_date DESC, rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list documents")?;

        Ok(documents)
    }

    #[inline]
    pub async fn mark_processed(pool: &SqlitePool, id: &str, chunk_count: i64) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET status = 'processed', chunk_count = ?, error_message = NULL \
             WHERE id = ?",
        )
        .bind(chunk_count)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark document processed")?;

        debug!("Document {} processed with {} chunks", id, chunk_count);
        Ok(())
    }

    #[inline]
    pub async fn mark_failed(pool: &SqlitePool, id: &str, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET status = 'failed', chunk_count = 0, error_message = ? \
             WHERE id = ?",
        )
        .bind(error_message)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark document failed")?;

        debug!("Document {} marked failed: {}", id, error_message);
        Ok(())
    }

    /// Store a summary and return the time it was recorded
    #[inline]
    pub async fn update_summary(
        pool: &SqlitePool,
        id: &str,
        summary: &str,
    ) -> Result<NaiveDateTime> {
        let now = Utc::now().naive_utc();

        sqlx::query("UPDATE documents SET summary = ?, summary_generated_at = ? WHERE id = ?")
            .bind(summary)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await
            .context("Failed to update document summary")?;

        Ok(now)
    }
}

pub struct DocumentRawQueries;

impl DocumentRawQueries {
    /// Insert or replace the extracted text of a document
    #[inline]
    pub async fn upsert(
        pool: &SqlitePool,
        document_id: &str,
        user_id: &str,
        content: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents_raw (document_id, user_id, content, created_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(document_id) DO UPDATE SET content = excluded.content, \
             created_at = excluded.created_at",
        )
        .bind(document_id)
        .bind(user_id)
        .bind(content)
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await
        .context("Failed to store raw document text")?;

        Ok(())
    }

    #[inline]
    pub async fn get(pool: &SqlitePool, document_id: &str) -> Result<Option<DocumentRaw>> {
        let raw = sqlx::query_as::<_, DocumentRaw>(
            "SELECT document_id, user_id, content, created_at FROM documents_raw \
             WHERE document_id = ?",
        )
        .bind(document_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get raw document text")?;

        Ok(raw)
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Store chunk rows in one transaction, replacing any row at the same
    /// `(document_id, chunk_index)`
    #[inline]
    pub async fn upsert_many(pool: &SqlitePool, chunks: &[NewDocumentChunk]) -> Result<u64> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().naive_utc();
        let mut tx = pool
            .begin()
            .await
            .context("Failed to begin chunk transaction")?;

        let mut stored = 0;
        for chunk in chunks {
            stored += sqlx::query(
                "INSERT INTO document_chunks \
                 (id, document_id, user_id, chunk_index, chunk_text, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(document_id, chunk_index) DO UPDATE SET \
                 id = excluded.id, chunk_text = excluded.chunk_text, \
                 created_at = excluded.created_at",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(&chunk.user_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.chunk_text)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to store chunk {}", chunk.chunk_index))?
            .rows_affected();
        }

        tx.commit()
            .await
            .context("Failed to commit chunk transaction")?;

        debug!("Stored {} chunk rows", stored);
        Ok(stored)
    }

    #[inline]
    pub async fn delete_for_document(pool: &SqlitePool, document_id: &str) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(pool)
            .await
            .context("Failed to delete document chunks")?
            .rows_affected();

        Ok(deleted)
    }

    #[inline]
    pub async fn list_for_document(
        pool: &SqlitePool,
        document_id: &str,
    ) -> Result<Vec<DocumentChunk>> {
        let chunks = sqlx::query_as::<_, DocumentChunk>(
            "SELECT id, document_id, user_id, chunk_index, chunk_text, created_at \
             FROM document_chunks WHERE document_id = ? ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
        .context("Failed to list document chunks")?;

        Ok(chunks)
    }
}

pub struct ChatQueries;

impl ChatQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, message: &NewChatMessage) -> Result<ChatMessage> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO chat_messages (id, user_id, question, answer, sources, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&message.user_id)
        .bind(&message.question)
        .bind(&message.answer)
        .bind(Json(&message.sources))
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to store chat message")?;

        Ok(ChatMessage {
            id,
            user_id: message.user_id.clone(),
            question: message.question.clone(),
            answer: message.answer.clone(),
            sources: Some(Json(message.sources.clone())),
            created_at: now,
        })
    }

    /// Most recent messages first
    #[inline]
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<ChatMessage>> {
        let messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT id, user_id, question, answer, sources, created_at FROM chat_messages \
             WHERE user_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list chat messages")?;

        Ok(messages)
    }
}

pub struct QuizQueries;

impl QuizQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, new_quiz: &NewQuiz) -> Result<Quiz> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let total_questions = i64::try_from(new_quiz.questions.len())
            .context("Question count does not fit in a database integer")?;

        sqlx::query(
            "INSERT INTO quizzes \
             (id, user_id, document_id, questions, total_questions, status, created_at) \
             VALUES (?, ?, ?, ?, ?, 'generated', ?)",
        )
        .bind(&id)
        .bind(&new_quiz.user_id)
        .bind(&new_quiz.document_id)
        .bind(Json(&new_quiz.questions))
        .bind(total_questions)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create quiz")?;

        Self::get_for_user(pool, &new_quiz.user_id, &id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created quiz"))
    }

    #[inline]
    pub async fn get_for_user(pool: &SqlitePool, user_id: &str, id: &str) -> Result<Option<Quiz>> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get quiz")?;

        Ok(quiz)
    }

    /// Record a submission unless the quiz was already submitted.
    ///
    /// The status check and the write are one statement, so of two racing
    /// submissions exactly one succeeds. Returns the attempt time on success.
    #[inline]
    pub async fn submit(
        pool: &SqlitePool,
        user_id: &str,
        id: &str,
        answers: &[UserAnswer],
        score: f64,
    ) -> Result<Option<NaiveDateTime>> {
        let now = Utc::now().naive_utc();

        let updated = sqlx::query(
            "UPDATE quizzes SET status = 'submitted', answers = ?, score = ?, attempted_at = ? \
             WHERE id = ? AND user_id = ? AND status != 'submitted'",
        )
        .bind(Json(answers))
        .bind(score)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to submit quiz")?
        .rows_affected();

        Ok((updated == 1).then_some(now))
    }

    /// Most recent quizzes first, optionally restricted to one document
    #[inline]
    pub async fn list_for_user(
        pool: &SqlitePool,
        user_id: &str,
        document_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Quiz>> {
        let quizzes = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes \
             WHERE user_id = ? AND (? IS NULL OR document_id = ?) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(document_id)
        .bind(document_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list quizzes")?;

        Ok(quizzes)
    }
}

pub struct StatisticsQueries;

impl StatisticsQueries {
    #[inline]
    pub async fn for_user(pool: &SqlitePool, user_id: &str) -> Result<StoreStatistics> {
        let (documents, processed_documents): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(status = 'processed'), 0) FROM documents \
             WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count documents")?;

        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("Failed to count chunks")?;

        let (quizzes, submitted_quizzes): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(status = 'submitted'), 0) FROM quizzes \
             WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count quizzes")?;

        let chat_messages: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(pool)
                .await
                .context("Failed to count chat messages")?;

        Ok(StoreStatistics {
            documents,
            processed_documents,
            chunks,
            quizzes,
            submitted_quizzes,
            chat_messages,
        })
    }
}
