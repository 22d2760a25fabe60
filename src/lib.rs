use thiserror::Error;

use crate::generation::GenerationError;
use crate::quiz::QuizError;

pub type Result<T> = std::result::Result<T, StudyError>;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Quiz error: {0}")]
    Quiz(#[from] QuizError),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl StudyError {
    #[inline]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Wrap a failure reported by the relational store
    #[inline]
    pub fn database(error: anyhow::Error) -> Self {
        Self::Database(format!("{error:#}"))
    }

    /// Errors caused by the caller's request rather than by a collaborator
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound { .. } | Self::Conflict(_)
        )
    }
}

pub mod commands;
pub mod config;
pub mod context;
pub mod database;
pub mod embeddings;
pub mod extraction;
pub mod generation;
pub mod ingestion;
pub mod ollama;
pub mod quiz;
pub mod rag;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_support;
