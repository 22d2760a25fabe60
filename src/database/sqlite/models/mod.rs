#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type};

use crate::quiz::{Question, UserAnswer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub status: DocumentStatus,
    pub summary: Option<String>,
    pub summary_generated_at: Option<NaiveDateTime>,
    pub chunk_count: i64,
    pub error_message: Option<String>,
    pub upload_date: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processed,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Uploaded => write!(f, "uploaded"),
            DocumentStatus::Processed => write!(f, "processed"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub user_id: String,
    pub filename: String,
}

/// Full extracted text of a document
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DocumentRaw {
    pub document_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub chunk_index: i64,
    pub chunk_text: String,
    pub created_at: NaiveDateTime,
}

/// Chunk row to store. The id is chosen by the caller so the vector store
/// can key the embedding by the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocumentChunk {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub chunk_index: i64,
    pub chunk_text: String,
}

/// A retrieved chunk that contributed to a chat answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSource {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub sources: Option<Json<Vec<ChunkSource>>>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub sources: Vec<ChunkSource>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Quiz {
    pub id: String,
    pub user_id: String,
    pub document_id: String,
    pub questions: Json<Vec<Question>>,
    pub total_questions: i64,
    pub score: Option<f64>,
    pub answers: Option<Json<Vec<UserAnswer>>>,
    pub status: QuizStatus,
    pub attempted_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Generated,
    InProgress,
    Submitted,
}

impl std::fmt::Display for QuizStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            QuizStatus::Generated => write!(f, "generated"),
            QuizStatus::InProgress => write!(f, "in_progress"),
            QuizStatus::Submitted => write!(f, "submitted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuiz {
    pub user_id: String,
    pub document_id: String,
    pub questions: Vec<Question>,
}

/// Per-user row counts across the relational store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStatistics {
    pub documents: i64,
    pub processed_documents: i64,
    pub chunks: i64,
    pub quizzes: i64,
    pub submitted_quizzes: i64,
    pub chat_messages: i64,
}

impl Document {
    #[inline]
    pub fn is_processed(&self) -> bool {
        self.status == DocumentStatus::Processed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.status == DocumentStatus::Failed
    }
}

impl Quiz {
    #[inline]
    pub fn is_submitted(&self) -> bool {
        self.status == QuizStatus::Submitted
    }
}

impl ChatMessage {
    #[inline]
    pub fn sources(&self) -> &[ChunkSource] {
        self.sources.as_ref().map_or(&[], |sources| sources.0.as_slice())
    }
}
