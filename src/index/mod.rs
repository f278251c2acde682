// Vector index module
// Chunk embeddings persisted in a LanceDB table and queried by similarity

#[cfg(test)]
mod tests;

pub mod vector_store;

pub use vector_store::{SearchResult, VectorStore};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::Chunk;
use crate::loader::ContentType;

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    pub vector: Vec<f32>,
    /// Metadata about the chunk this embedding represents
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// `<document id>:<chunk index>`
    pub chunk_id: String,
    pub document_id: String,
    /// File path or URL of the source document
    pub source: String,
    pub content_type: ContentType,
    pub page: Option<u32>,
    pub title: Option<String>,
    /// The actual text content of the chunk
    pub content: String,
    /// Index of this chunk within its document
    pub chunk_index: u32,
    /// Character offset of the chunk within its document
    pub start_index: u64,
    /// Timestamp when this embedding was created
    pub created_at: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            metadata: ChunkMetadata::from_chunk(chunk),
        }
    }
}

impl ChunkMetadata {
    #[inline]
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            chunk_id: format!("{}:{}", chunk.document_id, chunk.chunk_index),
            document_id: chunk.document_id.clone(),
            source: chunk.metadata.source.clone(),
            content_type: chunk.metadata.content_type,
            page: chunk.metadata.page,
            title: chunk.metadata.title.clone(),
            content: chunk.content.clone(),
            chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
            start_index: chunk.start_index as u64,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
