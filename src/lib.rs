use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Loader error: {0}")]
    Loader(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("No documents were loaded. Please check your files or URLs.")]
    NoDocumentsLoaded,

    #[error("Unsupported file type: {0} (expected a .txt or .pdf file)")]
    UnsupportedFileType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod engine;
mod http;
pub mod index;
pub mod llm;
pub mod loader;
pub mod preprocess;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
