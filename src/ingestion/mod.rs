#[cfg(test)]
mod tests;

use chrono::Utc;
use futures::{StreamExt, stream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::StudyContext;
use crate::database::{ChunkMetadata, Document, EmbeddingRecord, NewDocumentChunk};
use crate::embeddings::{ContentChunk, EmbeddingTask, chunk_content, is_usable_embedding};
use crate::{Result, StudyError};

/// Outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionReport {
    pub document: Document,
    pub chunks_total: usize,
    pub chunks_stored: usize,
    /// Chunks left out because their embedding was unusable
    pub chunks_skipped: usize,
}

/// Turns an uploaded file into stored, embedded chunks.
///
/// Every run first removes what an earlier run of the same document left
/// behind, so re-running never duplicates chunks.
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    context: StudyContext,
}

impl IngestionPipeline {
    #[inline]
    pub fn new(context: StudyContext) -> Self {
        Self { context }
    }

    /// Store a new document and process it to completion
    #[inline]
    pub async fn ingest(
        &self,
        user_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestionReport> {
        if user_id.trim().is_empty() {
            return Err(StudyError::Validation("user id is required".to_string()));
        }
        if filename.trim().is_empty() {
            return Err(StudyError::Validation("filename is required".to_string()));
        }

        let database = &self.context.database;
        let document = database
            .create_document(user_id, filename)
            .await
            .map_err(StudyError::database)?;
        info!(
            "Ingesting {} ({} bytes) as document {}",
            filename,
            bytes.len(),
            document.id
        );

        let text = self.context.extract(filename.to_string(), bytes).await;
        if text.trim().is_empty() {
            warn!(
                "No text extracted from {}; document {} will have no chunks",
                filename, document.id
            );
        }

        if let Err(e) = database
            .store_raw_text(&document.id, user_id, &text)
            .await
            .map_err(StudyError::database)
        {
            return Err(self.fail(&document, e).await);
        }

        self.process_text(document, &text).await
    }

    /// Re-run chunking, embedding and storage from the stored text
    #[inline]
    pub async fn reprocess(&self, user_id: &str, document_id: &str) -> Result<IngestionReport> {
        let database = &self.context.database;

        let document = database
            .get_document_for_user(user_id, document_id)
            .await
            .map_err(StudyError::database)?
            .ok_or_else(|| StudyError::not_found("document", document_id))?;

        let raw = database
            .get_raw_text(document_id)
            .await
            .map_err(StudyError::database)?
            .ok_or_else(|| {
                StudyError::Conflict(format!("document {document_id} has no stored text"))
            })?;

        info!("Reprocessing document {}", document_id);
        self.process_text(document, &raw.content).await
    }

    /// A user's documents, newest first
    #[inline]
    pub async fn list_documents(&self, user_id: &str) -> Result<Vec<Document>> {
        self.context
            .database
            .list_documents(user_id)
            .await
            .map_err(StudyError::database)
    }

    /// Unknown ids and other users' ids are both reported as not found
    #[inline]
    pub async fn get_document(&self, user_id: &str, document_id: &str) -> Result<Document> {
        self.context
            .database
            .get_document_for_user(user_id, document_id)
            .await
            .map_err(StudyError::database)?
            .ok_or_else(|| StudyError::not_found("document", document_id))
    }

    async fn process_text(&self, document: Document, text: &str) -> Result<IngestionReport> {
        let chunks = chunk_content(text, &self.context.config.chunking);
        let chunks_total = chunks.len();

        let embeddings = self.embed_chunks(&chunks).await;

        let dimension = self.context.embedding_dimension();
        let created_at = Utc::now().naive_utc().to_string();
        let mut rows = Vec::with_capacity(chunks_total);
        let mut records = Vec::with_capacity(chunks_total);

        for (chunk, vector) in chunks.into_iter().zip(embeddings) {
            if !is_usable_embedding(&vector, dimension) {
                warn!(
                    "Skipping chunk {} of document {}: embedding has {} dimensions, expected {}",
                    chunk.chunk_index,
                    document.id,
                    vector.len(),
                    dimension
                );
                continue;
            }

            let id = Uuid::new_v4().to_string();
            let chunk_index = u32::try_from(chunk.chunk_index).map_err(|_| {
                StudyError::Validation(format!("document {} has too many chunks", document.id))
            })?;

            records.push(EmbeddingRecord {
                id: id.clone(),
                vector,
                metadata: ChunkMetadata {
                    chunk_id: id.clone(),
                    document_id: document.id.clone(),
                    user_id: document.user_id.clone(),
                    content: chunk.content.clone(),
                    chunk_index,
                    created_at: created_at.clone(),
                },
            });
            rows.push(NewDocumentChunk {
                id,
                document_id: document.id.clone(),
                user_id: document.user_id.clone(),
                chunk_index: i64::from(chunk_index),
                chunk_text: chunk.content,
            });
        }

        let chunks_stored = rows.len();
        let chunks_skipped = chunks_total - chunks_stored;

        if let Err(e) = self.store_chunks(&document, &rows, records).await {
            return Err(self.fail(&document, e).await);
        }

        let stored_count = i64::try_from(chunks_stored).unwrap_or(i64::MAX);
        if let Err(e) = self
            .context
            .database
            .mark_document_processed(&document.id, stored_count)
            .await
            .map_err(StudyError::database)
        {
            return Err(self.fail(&document, e).await);
        }

        let document = self
            .context
            .database
            .get_document(&document.id)
            .await
            .map_err(StudyError::database)?
            .ok_or_else(|| StudyError::not_found("document", document.id.clone()))?;

        info!(
            "Document {} processed: {} of {} chunks stored, {} skipped",
            document.id, chunks_stored, chunks_total, chunks_skipped
        );

        Ok(IngestionReport {
            document,
            chunks_total,
            chunks_stored,
            chunks_skipped,
        })
    }

    /// Embed every chunk with bounded concurrency, keeping chunk order
    async fn embed_chunks(&self, chunks: &[ContentChunk]) -> Vec<Vec<f32>> {
        let concurrency = self.context.config.ingestion.embedding_concurrency.max(1);
        debug!(
            "Embedding {} chunks with up to {} requests in flight",
            chunks.len(),
            concurrency
        );

        stream::iter(chunks.iter().map(|chunk| {
            self.context
                .embed(chunk.content.clone(), EmbeddingTask::Document)
        }))
        .buffered(concurrency)
        .collect()
        .await
    }

    async fn store_chunks(
        &self,
        document: &Document,
        rows: &[NewDocumentChunk],
        records: Vec<EmbeddingRecord>,
    ) -> Result<()> {
        let database = &self.context.database;

        let removed = database
            .delete_document_chunks(&document.id)
            .await
            .map_err(StudyError::database)?;
        if removed > 0 {
            debug!(
                "Removed {} chunk rows from an earlier run of {}",
                removed, document.id
            );
        }
        self.context
            .chunk_index
            .delete_document_chunks(&document.id)
            .await?;

        database
            .upsert_chunks(rows)
            .await
            .map_err(StudyError::database)?;
        self.context.chunk_index.insert_chunks(records).await?;

        Ok(())
    }

    /// Undo partial writes and record the failure on the document
    async fn fail(&self, document: &Document, error: StudyError) -> StudyError {
        error!("Ingestion of document {} failed: {}", document.id, error);

        if let Err(e) = self
            .context
            .database
            .delete_document_chunks(&document.id)
            .await
        {
            warn!("Failed to remove chunk rows of {}: {:#}", document.id, e);
        }
        if let Err(e) = self
            .context
            .chunk_index
            .delete_document_chunks(&document.id)
            .await
        {
            warn!("Failed to remove vectors of {}: {}", document.id, e);
        }
        if let Err(e) = self
            .context
            .database
            .mark_document_failed(&document.id, &error.to_string())
            .await
        {
            warn!("Failed to mark document {} failed: {:#}", document.id, e);
        }

        error
    }
}
