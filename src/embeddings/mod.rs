// Embeddings module
// Text chunking and the embedding service client

pub mod chunking;
pub mod ollama;

pub use chunking::{Chunk, ChunkingConfig, TextChunker};
pub use ollama::{EmbeddingResult, OllamaClient};

/// Turns text into vectors for the index
pub trait Embedder: Send + Sync {
    /// Embed a batch of chunk texts, one vector per input, in input order
    fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    /// Embed a search query
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}
