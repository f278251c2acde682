#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::{Embedder, TextChunker};
use crate::engine::{Answer, AnswerEngine};
use crate::index::VectorStore;
use crate::llm::{ChatMessage, ChatModel};
use crate::loader::{DataLoader, Document, Source};
use crate::preprocess::preprocess_documents;
use crate::{AssistantError, Result};

/// A file handed to the session: its name decides how it is parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl Upload {
    #[inline]
    pub fn new(file_name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            contents,
        }
    }

    /// Read a local file as an upload
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read(path).map_err(|e| {
            AssistantError::Loader(format!("Failed to read {}: {e}", path.display()))
        })?;
        Ok(Self::new(path.display().to_string(), contents))
    }
}

/// Counts reported after a successful processing run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub documents: usize,
    pub chunks: usize,
}

/// Turns uploads and URLs into a persisted index
pub struct Ingestor {
    config: Config,
    embedder: Arc<dyn Embedder>,
    staging: TempDir,
}

impl std::fmt::Debug for Ingestor {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("index_directory", &self.config.index_directory())
            .field("staging", &self.staging.path())
            .finish_non_exhaustive()
    }
}

impl Ingestor {
    #[inline]
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let staging = tempfile::Builder::new()
            .prefix("knowledge-assistant-")
            .tempdir()?;
        debug!("Staging uploads in {}", staging.path().display());

        Ok(Self {
            config,
            embedder,
            staging,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load, clean, chunk and index the given uploads and newline-separated URLs.
    ///
    /// The index is rebuilt from scratch. A local file that cannot be read or parsed
    /// aborts the whole run; unreachable URLs are skipped.
    #[inline]
    pub async fn process(
        &self,
        uploads: &[Upload],
        web_urls: &str,
    ) -> Result<(VectorStore, ProcessOutcome)> {
        let urls = parse_urls(web_urls);
        if uploads.is_empty() && urls.is_empty() {
            return Err(AssistantError::NoDocumentsLoaded);
        }

        let chunker = TextChunker::new(self.config.chunking.clone())?;
        let mut loader = DataLoader::new(&self.config.web);

        let mut documents = Vec::new();
        for upload in uploads {
            documents.extend(self.load_upload(&mut loader, upload)?);
        }
        for url in &urls {
            documents.extend(loader.load_web_content(url));
        }

        if documents.is_empty() {
            warn!(
                "No documents loaded from {} uploads and {} URLs",
                uploads.len(),
                urls.len()
            );
            return Err(AssistantError::NoDocumentsLoaded);
        }

        preprocess_documents(&mut documents);
        let chunks = chunker.split_documents(&documents);
        if chunks.is_empty() {
            warn!(
                "{} documents were empty after cleaning, nothing to index",
                documents.len()
            );
            return Err(AssistantError::NoDocumentsLoaded);
        }

        let store = VectorStore::build(
            &self.config.index_directory(),
            &chunks,
            Arc::clone(&self.embedder),
        )
        .await?;

        info!(
            "Processed {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        Ok((
            store,
            ProcessOutcome {
                documents: documents.len(),
                chunks: chunks.len(),
            },
        ))
    }

    /// Reopen the index persisted by an earlier run
    #[inline]
    pub async fn open_index(&self) -> Result<VectorStore> {
        VectorStore::load(&self.config.index_directory(), Arc::clone(&self.embedder)).await
    }

    /// Stage an upload on disk, load it, and remove the staged copy
    fn load_upload(&self, loader: &mut DataLoader, upload: &Upload) -> Result<Vec<Document>> {
        let source = Source::from_path(Path::new(&upload.file_name))?;
        let base_name = Path::new(&upload.file_name)
            .file_name()
            .ok_or_else(|| AssistantError::UnsupportedFileType(upload.file_name.clone()))?;

        let staged_path = self.staging.path().join(base_name);
        fs::write(&staged_path, &upload.contents)?;
        debug!("Staged {} at {}", upload.file_name, staged_path.display());

        let loaded = loader.load(&Source {
            location: staged_path.display().to_string(),
            content_type: source.content_type,
        });

        if let Err(e) = fs::remove_file(&staged_path) {
            warn!("Failed to remove staged file {}: {}", staged_path.display(), e);
        }

        let mut documents = loaded?;
        for document in &mut documents {
            document.metadata.source.clone_from(&upload.file_name);
        }
        Ok(documents)
    }
}

/// State of one interactive run: the answer engine, its index and the chat log
#[derive(Debug)]
pub struct Session {
    ingestor: Ingestor,
    engine: AnswerEngine,
    chat_history: Vec<ChatMessage>,
}

impl Session {
    #[inline]
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, llm: Arc<dyn ChatModel>) -> Result<Self> {
        Ok(Self {
            ingestor: Ingestor::new(config, embedder)?,
            engine: AnswerEngine::new(llm),
            chat_history: Vec::new(),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        self.ingestor.config()
    }

    #[inline]
    pub fn engine(&self) -> &AnswerEngine {
        &self.engine
    }

    /// Whether an index has been built or loaded
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// Questions and answers in submission order
    #[inline]
    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.chat_history
    }

    /// Rebuild the index from the given sources and answer from it.
    ///
    /// On any error the previous index, if there is one, stays in use.
    #[inline]
    pub async fn process_documents(
        &mut self,
        uploads: &[Upload],
        web_urls: &str,
    ) -> Result<ProcessOutcome> {
        let (store, outcome) = self.ingestor.process(uploads, web_urls).await?;
        self.engine.setup_retrieval_chain(store);
        Ok(outcome)
    }

    /// Reopen the index persisted by an earlier run. Returns the number of stored chunks.
    #[inline]
    pub async fn load_index(&mut self) -> Result<usize> {
        let store = self.ingestor.open_index().await?;
        let count = store.count().await?;
        self.engine.setup_retrieval_chain(store);
        Ok(count)
    }

    /// Ask a question and record both sides of the exchange in the chat log
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        self.chat_history.push(ChatMessage::user(question));
        let answer = self.engine.ask(question).await?;
        self.chat_history
            .push(ChatMessage::assistant(answer.answer.clone()));
        Ok(answer)
    }
}

/// Split a newline-separated URL field, dropping blank lines
#[inline]
pub fn parse_urls(web_urls: &str) -> Vec<String> {
    web_urls
        .lines()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}
