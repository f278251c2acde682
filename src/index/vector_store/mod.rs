
use super::{ChunkMetadata, EmbeddingRecord};
use crate::embeddings::{Chunk, Embedder};
use crate::loader::ContentType;
use crate::{AssistantError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const TABLE_NAME: &str = "chunks";

/// Handle to a persisted chunk index
pub struct VectorStore {
    table: Table,
    directory: PathBuf,
    embedder: Arc<dyn Embedder>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: ChunkMetadata,
    /// `1 - cosine distance`, higher is more similar
    pub similarity_score: f32,
    pub distance: f32,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("directory", &self.directory)
            .field("table", &TABLE_NAME)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Embed `chunks` and write them as a fresh index under `directory`.
    ///
    /// Any index previously stored there is replaced.
    #[inline]
    pub async fn build(
        directory: &Path,
        chunks: &[Chunk],
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(AssistantError::Index(
                "No chunks to index: the documents contained no text".to_string(),
            ));
        }

        info!(
            "Building index of {} chunks at {}",
            chunks.len(),
            directory.display()
        );

        let vectors = embed_chunks(chunks, Arc::clone(&embedder)).await?;
        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::new(chunk, vector))
            .collect();
        let vector_dim = vector_dimension(&records)?;

        std::fs::create_dir_all(directory).map_err(|e| {
            AssistantError::Index(format!(
                "Failed to create index directory {}: {}",
                directory.display(),
                e
            ))
        })?;
        let connection = connect(directory).await?;
        drop_table_if_exists(&connection).await?;

        let table = connection
            .create_empty_table(TABLE_NAME, create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| AssistantError::Index(format!("Failed to create table: {}", e)))?;

        let record_batch = create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| AssistantError::Index(format!("Failed to insert embeddings: {}", e)))?;

        info!(
            "Stored {} embeddings with {} dimensions",
            records.len(),
            vector_dim
        );

        Ok(Self {
            table,
            directory: directory.to_path_buf(),
            embedder,
        })
    }

    /// Reopen an index previously written by [`VectorStore::build`]
    #[inline]
    pub async fn load(directory: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        if !directory.is_dir() {
            return Err(AssistantError::Index(format!(
                "No index found at {}. Process some documents first.",
                directory.display()
            )));
        }

        let connection = connect(directory).await?;
        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| AssistantError::Index(format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Err(AssistantError::Index(format!(
                "No index found at {}. Process some documents first.",
                directory.display()
            )));
        }

        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| AssistantError::Index(format!("Failed to open table: {}", e)))?;

        debug!("Opened index at {}", directory.display());

        Ok(Self {
            table,
            directory: directory.to_path_buf(),
            embedder,
        })
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of chunks stored in the index
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| AssistantError::Index(format!("Failed to count rows: {}", e)))
    }

    /// Embed `query` and return the `k` most similar chunks, best first
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedder = Arc::clone(&self.embedder);
        let query_text = query.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed_query(&query_text))
            .await
            .map_err(|e| AssistantError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| AssistantError::Embedding(format!("{:#}", e)))?;

        self.search_by_vector(&query_vector, k).await
    }

    /// Return the `k` chunks nearest to `query_vector` by cosine distance, best first
    #[inline]
    pub async fn search_by_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for similar vectors with limit: {}", k);

        let mut stream = self
            .table
            .vector_search(query_vector)
            .map_err(|e| AssistantError::Index(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| AssistantError::Index(format!("Failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| AssistantError::Index(format!("Failed to read result stream: {}", e)))?
        {
            results.extend(parse_search_batch(&batch)?);
        }

        results.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
        results.truncate(k);

        debug!("Found {} search results", results.len());
        Ok(results)
    }
}

async fn embed_chunks(chunks: &[Chunk], embedder: Arc<dyn Embedder>) -> Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let expected = texts.len();

    let vectors = tokio::task::spawn_blocking(move || embedder.embed_documents(&texts))
        .await
        .map_err(|e| AssistantError::Embedding(format!("Embedding task failed: {}", e)))?
        .map_err(|e| AssistantError::Embedding(format!("{:#}", e)))?;

    if vectors.len() != expected {
        return Err(AssistantError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }

    Ok(vectors)
}

/// Common dimension of all record vectors
fn vector_dimension(records: &[EmbeddingRecord]) -> Result<usize> {
    let dim = records.first().map_or(0, |r| r.vector.len());
    if dim == 0 {
        return Err(AssistantError::Embedding(
            "Embedding service returned empty vectors".to_string(),
        ));
    }

    if let Some(bad) = records.iter().find(|r| r.vector.len() != dim) {
        return Err(AssistantError::Embedding(format!(
            "Inconsistent embedding dimensions: {} vs {}",
            dim,
            bad.vector.len()
        )));
    }

    Ok(dim)
}

async fn connect(directory: &Path) -> Result<Connection> {
    let uri = directory.display().to_string();
    debug!("Connecting to LanceDB at {}", uri);

    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| AssistantError::Index(format!("Failed to connect to LanceDB: {}", e)))
}

async fn drop_table_if_exists(connection: &Connection) -> Result<()> {
    let table_names = connection
        .table_names()
        .execute()
        .await
        .map_err(|e| AssistantError::Index(format!("Failed to list tables for drop: {}", e)))?;

    if table_names.iter().any(|name| name == TABLE_NAME) {
        debug!("Dropping existing {} table", TABLE_NAME);
        connection
            .drop_table(TABLE_NAME)
            .await
            .map_err(|e| AssistantError::Index(format!("Failed to drop table: {}", e)))?;
    }

    Ok(())
}

/// Create schema with the specified vector dimension
fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("chunk_id", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("content_type", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, true),
        Field::new("title", DataType::Utf8, true),
        Field::new("content", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("start_index", DataType::UInt64, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);
    let mut chunk_ids = Vec::with_capacity(len);
    let mut document_ids = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut content_types = Vec::with_capacity(len);
    let mut pages = Vec::with_capacity(len);
    let mut titles = Vec::with_capacity(len);
    let mut contents = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut start_indices = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(&record.vector);
        chunk_ids.push(record.metadata.chunk_id.as_str());
        document_ids.push(record.metadata.document_id.as_str());
        sources.push(record.metadata.source.as_str());
        content_types.push(record.metadata.content_type.as_str());
        pages.push(record.metadata.page);
        titles.push(record.metadata.title.as_deref());
        contents.push(record.metadata.content.as_str());
        chunk_indices.push(record.metadata.chunk_index);
        start_indices.push(record.metadata.start_index);
        created_ats.push(record.metadata.created_at.as_str());
    }

    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| AssistantError::Index(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(chunk_ids)),
        Arc::new(StringArray::from(document_ids)),
        Arc::new(StringArray::from(sources)),
        Arc::new(StringArray::from(content_types)),
        Arc::new(UInt32Array::from(pages)),
        Arc::new(StringArray::from(titles)),
        Arc::new(StringArray::from(contents)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(UInt64Array::from(start_indices)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| AssistantError::Index(format!("Failed to create record batch: {}", e)))
}

fn typed_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| AssistantError::Index(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| AssistantError::Index(format!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let chunk_ids = typed_column::<StringArray>(batch, "chunk_id")?;
    let document_ids = typed_column::<StringArray>(batch, "document_id")?;
    let sources = typed_column::<StringArray>(batch, "source")?;
    let content_types = typed_column::<StringArray>(batch, "content_type")?;
    let pages = typed_column::<UInt32Array>(batch, "page")?;
    let titles = typed_column::<StringArray>(batch, "title")?;
    let contents = typed_column::<StringArray>(batch, "content")?;
    let chunk_indices = typed_column::<UInt32Array>(batch, "chunk_index")?;
    let start_indices = typed_column::<UInt64Array>(batch, "start_index")?;
    let created_ats = typed_column::<StringArray>(batch, "created_at")?;

    let distances = typed_column::<Float32Array>(batch, "_distance")?;

    let mut search_results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let content_type = ContentType::parse(content_types.value(row)).ok_or_else(|| {
            AssistantError::Index(format!(
                "Unknown content type in index: {}",
                content_types.value(row)
            ))
        })?;

        let chunk = ChunkMetadata {
            chunk_id: chunk_ids.value(row).to_string(),
            document_id: document_ids.value(row).to_string(),
            source: sources.value(row).to_string(),
            content_type,
            page: (!pages.is_null(row)).then(|| pages.value(row)),
            title: (!titles.is_null(row)).then(|| titles.value(row).to_string()),
            content: contents.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            start_index: start_indices.value(row),
            created_at: created_ats.value(row).to_string(),
        };

        if distances.is_null(row) {
            return Err(AssistantError::Index(format!(
                "Missing distance for chunk {}",
                chunk.chunk_id
            )));
        }
        let distance = distances.value(row);

        search_results.push(SearchResult {
            chunk,
            similarity_score: 1.0 - distance,
            distance,
        });
    }

    Ok(search_results)
}
