#[cfg(test)]
mod tests;

use super::{ChunkIndex, ChunkMetadata, EmbeddingRecord};
use crate::{StudyError, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const TABLE_NAME: &str = "chunk_embeddings";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    dimension: usize,
}

/// One chunk returned by a similarity query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    /// L2 distance to the query vector; smaller is closer
    pub distance: f32,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("table_name", &self.table_name)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open the store under the configured base directory with the configured dimension
    #[inline]
    pub async fn new(config: &Config) -> Result<Self, StudyError> {
        let dimension = usize::try_from(config.ollama.embedding_dimension)
            .map_err(|e| StudyError::Config(format!("Invalid embedding dimension: {}", e)))?;
        Self::open(&config.vector_database_path(), dimension).await
    }

    /// Open (or create) the store at `db_path`.
    ///
    /// Fails when an existing table was built for a different dimension; the
    /// caller must re-ingest under the new model instead of mixing vectors.
    #[inline]
    pub async fn open(db_path: &Path, dimension: usize) -> Result<Self, StudyError> {
        if dimension == 0 {
            return Err(StudyError::Config(
                "Embedding dimension must be positive".to_string(),
            ));
        }

        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StudyError::Database(format!("Failed to create vector database directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt")
                    || error_msg.contains("invalid")
                    || error_msg.contains("malformed")
                {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        StudyError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(StudyError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let store = Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            dimension,
        };

        store.initialize_table_with_recovery().await?;
        store.verify_dimension().await?;

        info!("Vector store initialized with {} dimensions", dimension);
        Ok(store)
    }

    /// Create the embeddings table when it does not exist yet
    async fn initialize_table(&self) -> Result<(), StudyError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&self.table_name) {
            debug!("Embeddings table already exists");
            return Ok(());
        }

        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(self.dimension))
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to create table: {}", e)))?;

        info!(
            "Embeddings table created with {} dimensions",
            self.dimension
        );
        Ok(())
    }

    async fn verify_dimension(&self) -> Result<(), StudyError> {
        let existing = self.detect_existing_vector_dimension().await?;
        if existing != self.dimension {
            error!(
                "Stored vectors have {} dimensions but {} are configured",
                existing, self.dimension
            );
            return Err(StudyError::Config(format!(
                "Vector table holds {}-dimensional embeddings but the configured model produces {}; \
                 re-ingest documents after removing the vector directory",
                existing, self.dimension
            )));
        }
        Ok(())
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize, StudyError> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                StudyError::Database(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    i32::try_from(dimension).unwrap_or(i32::MAX),
                ),
                false,
            ),
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<Table, StudyError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to open table: {}", e)))
    }

    /// Store multiple embeddings in one write
    #[inline]
    pub async fn store_embeddings_batch(
        &self,
        records: &[EmbeddingRecord],
    ) -> Result<(), StudyError> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(StudyError::Embedding(format!(
                "Embedding for chunk {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                self.dimension
            )));
        }

        debug!("Storing batch of {} embeddings", records.len());

        let record_batch = self.create_record_batch(records)?;
        let table = self.open_table().await?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!("Stored {} embeddings", records.len());
        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch, StudyError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);
        let mut chunk_ids = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut user_ids = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            chunk_ids.push(record.metadata.chunk_id.as_str());
            document_ids.push(record.metadata.document_id.as_str());
            user_ids.push(record.metadata.user_id.as_str());
            contents.push(record.metadata.content.as_str());
            chunk_indices.push(record.metadata.chunk_index);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let list_size = i32::try_from(self.dimension)
            .map_err(|e| StudyError::Database(format!("Vector dimension too large: {}", e)))?;
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            list_size,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| StudyError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(chunk_ids)),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(user_ids)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(self.dimension), arrays)
            .map_err(|e| StudyError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Nearest chunks owned by `user_id`, ascending by L2 distance
    #[inline]
    pub async fn search_similar(
        &self,
        user_id: &str,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>, StudyError> {
        if query_vector.len() != self.dimension {
            return Err(StudyError::Embedding(format!(
                "Query vector has {} dimensions, expected {}",
                query_vector.len(),
                self.dimension
            )));
        }

        debug!("Searching for similar vectors with limit: {}", limit);

        let results = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| StudyError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .only_if(format!("user_id = '{}'", escape_literal(user_id)))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = Self::parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(search_results)
    }

    async fn parse_search_results_stream(
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>, StudyError> {
        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| StudyError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, StudyError> {
        let chunk_ids = string_column(batch, "chunk_id")?;
        let document_ids = string_column(batch, "document_id")?;
        let user_ids = string_column(batch, "user_id")?;
        let contents = string_column(batch, "content")?;
        let created_ats = string_column(batch, "created_at")?;
        let chunk_indices = batch
            .column_by_name("chunk_index")
            .ok_or_else(|| StudyError::Database("Missing chunk_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| StudyError::Database("Invalid chunk_index column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

        let results = (0..batch.num_rows())
            .map(|row| SearchResult {
                chunk_metadata: ChunkMetadata {
                    chunk_id: chunk_ids.value(row).to_string(),
                    document_id: document_ids.value(row).to_string(),
                    user_id: user_ids.value(row).to_string(),
                    content: contents.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    created_at: created_ats.value(row).to_string(),
                },
                distance: distances
                    .filter(|d| !d.is_null(row))
                    .map_or(0.0, |d| d.value(row)),
            })
            .collect();

        Ok(results)
    }

    /// Delete all embeddings for a document
    #[inline]
    pub async fn delete_document_embeddings(&self, document_id: &str) -> Result<(), StudyError> {
        debug!("Deleting embeddings for document: {}", document_id);

        let predicate = format!("document_id = '{}'", escape_literal(document_id));
        self.open_table()
            .await?
            .delete(&predicate)
            .await
            .map_err(|e| {
                StudyError::Database(format!("Failed to delete document embeddings: {}", e))
            })?;

        debug!("Deleted embeddings for document: {}", document_id);
        Ok(())
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64, StudyError> {
        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| StudyError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Compact data files and prune old versions
    #[inline]
    pub async fn optimize(&self) -> Result<(), StudyError> {
        debug!("Optimizing vector database");

        self.open_table()
            .await?
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| StudyError::Database(format!("Failed to optimize table: {}", e)))?;

        info!("Vector database optimization completed");
        Ok(())
    }

    /// True when the table exists and can be read
    #[inline]
    pub async fn validate_integrity(&self) -> bool {
        debug!("Validating vector database integrity");

        match self.open_table().await {
            Ok(table) => match table.count_rows(None).await {
                Ok(count) => {
                    debug!("Integrity check passed, {} rows found", count);
                    true
                }
                Err(e) => {
                    error!("Failed to count rows during integrity check: {}", e);
                    false
                }
            },
            Err(e) => {
                error!("Integrity check failed: {}", e);
                false
            }
        }
    }

    /// Move an unreadable database aside so a fresh one can be created
    fn attempt_corruption_recovery(db_path: &Path) -> Result<(), StudyError> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                StudyError::Database(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        info!("Database corruption recovery completed");
        Ok(())
    }

    async fn initialize_table_with_recovery(&self) -> Result<(), StudyError> {
        match self.initialize_table().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt") || error_msg.contains("invalid") {
                    warn!("Table corruption detected during initialization: {}", e);

                    if let Err(drop_err) = self.drop_table_if_exists().await {
                        warn!("Failed to drop corrupted table: {}", drop_err);
                    }

                    self.initialize_table().await.map_err(|e| {
                        StudyError::Database(format!(
                            "Failed to recreate table after corruption: {}",
                            e
                        ))
                    })
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn drop_table_if_exists(&self) -> Result<(), StudyError> {
        let table_names =
            self.connection.table_names().execute().await.map_err(|e| {
                StudyError::Database(format!("Failed to list tables for drop: {}", e))
            })?;

        if table_names.contains(&self.table_name) {
            info!("Dropping existing embeddings table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| StudyError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl ChunkIndex for VectorStore {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    async fn insert_chunks(&self, records: Vec<EmbeddingRecord>) -> crate::Result<()> {
        self.store_embeddings_batch(&records).await
    }

    #[inline]
    async fn delete_document_chunks(&self, document_id: &str) -> crate::Result<()> {
        self.delete_document_embeddings(document_id).await
    }

    #[inline]
    async fn nearest_chunks(
        &self,
        user_id: &str,
        vector: &[f32],
        k: usize,
    ) -> crate::Result<Vec<SearchResult>> {
        self.search_similar(user_id, vector, k).await
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StudyError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StudyError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StudyError::Database(format!("Invalid {} column type", name)))
}

/// Quote a value for use inside a single-quoted filter literal
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
