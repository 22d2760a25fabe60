#[cfg(test)]
mod tests;

use tracing::{debug, info, warn};

use crate::context::StudyContext;
use crate::database::{ChatMessage, ChunkSource, NewChatMessage, SearchResult};
use crate::embeddings::{EmbeddingTask, is_usable_embedding};
use crate::generation::prompt::{CONTEXT_DELIMITER, grounded_answer_prompt};
use crate::{Result, StudyError};

const MAX_HISTORY: i64 = 100;

/// Join retrieved chunk texts in rank order
#[inline]
pub fn assemble_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|result| result.chunk_metadata.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

/// Answer to one question together with the chunks it was grounded on
#[derive(Debug, Clone, PartialEq)]
pub struct ChatAnswer {
    pub message_id: String,
    pub answer: String,
    pub sources: Vec<ChunkSource>,
}

/// Retrieval-augmented question answering over a user's documents
#[derive(Debug, Clone)]
pub struct ChatService {
    context: StudyContext,
}

impl ChatService {
    #[inline]
    pub fn new(context: StudyContext) -> Self {
        Self { context }
    }

    /// Retrieve, generate and log.
    ///
    /// An unusable question embedding skips retrieval entirely and the model
    /// answers from an empty context. A generation failure is returned as an
    /// error and nothing is logged.
    #[inline]
    pub async fn ask(&self, user_id: &str, question: &str) -> Result<ChatAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(StudyError::Validation("question is required".to_string()));
        }
        if user_id.trim().is_empty() {
            return Err(StudyError::Validation("user id is required".to_string()));
        }

        let results = self.retrieve(user_id, question).await?;
        let context = assemble_context(&results);
        debug!(
            "Assembled {} characters of context from {} chunks",
            context.chars().count(),
            results.len()
        );

        let answer = self
            .context
            .generate(grounded_answer_prompt(question, &context))
            .await?;

        let sources: Vec<ChunkSource> = results
            .into_iter()
            .map(|result| ChunkSource {
                chunk_id: result.chunk_metadata.chunk_id,
                document_id: result.chunk_metadata.document_id,
                chunk_index: i64::from(result.chunk_metadata.chunk_index),
                distance: result.distance,
            })
            .collect();

        let message = self
            .context
            .database
            .insert_chat_message(&NewChatMessage {
                user_id: user_id.to_string(),
                question: question.to_string(),
                answer: answer.clone(),
                sources: sources.clone(),
            })
            .await
            .map_err(StudyError::database)?;

        info!(
            "Answered question for {} using {} sources",
            user_id,
            sources.len()
        );

        Ok(ChatAnswer {
            message_id: message.id,
            answer,
            sources,
        })
    }

    async fn retrieve(&self, user_id: &str, question: &str) -> Result<Vec<SearchResult>> {
        let vector = self
            .context
            .embed(question.to_string(), EmbeddingTask::Query)
            .await;

        let dimension = self.context.embedding_dimension();
        if !is_usable_embedding(&vector, dimension) {
            warn!(
                "Question embedding unusable ({} dimensions, expected {}); answering without context",
                vector.len(),
                dimension
            );
            return Ok(Vec::new());
        }

        self.context
            .chunk_index
            .nearest_chunks(user_id, &vector, self.context.config.retrieval.top_k)
            .await
    }

    /// Chat log for a user, newest first
    #[inline]
    pub async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
        let limit = i64::try_from(limit).unwrap_or(MAX_HISTORY).clamp(1, MAX_HISTORY);
        self.context
            .database
            .list_chat_messages(user_id, limit)
            .await
            .map_err(StudyError::database)
    }
}
