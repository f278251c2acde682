// Document loading
// Local text and PDF files plus web pages, one Document per file, page or URL

pub mod web;


use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use self::web::WebClient;
use crate::config::WebConfig;
use crate::{AssistantError, Result};

/// Declared kind of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Pdf,
    Web,
}

impl ContentType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Pdf => "pdf",
            Self::Web => "web",
        }
    }

    #[inline]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "web" => Some(Self::Web),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file path or URL together with its declared content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub location: String,
    pub content_type: ContentType,
}

impl Source {
    #[inline]
    pub fn text(path: impl Into<String>) -> Self {
        Self {
            location: path.into(),
            content_type: ContentType::Text,
        }
    }

    #[inline]
    pub fn pdf(path: impl Into<String>) -> Self {
        Self {
            location: path.into(),
            content_type: ContentType::Pdf,
        }
    }

    #[inline]
    pub fn web(url: impl Into<String>) -> Self {
        Self {
            location: url.into(),
            content_type: ContentType::Web,
        }
    }

    /// Infer the content type from the file extension (`.txt` or `.pdf`)
    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let location = path.display().to_string();

        match extension.as_deref() {
            Some("txt") => Ok(Self::text(location)),
            Some("pdf") => Ok(Self::pdf(location)),
            _ => Err(AssistantError::UnsupportedFileType(location)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File path or URL the document came from
    pub source: String,
    pub content_type: ContentType,
    /// 1-based page number for PDF documents
    pub page: Option<u32>,
    pub title: Option<String>,
    pub language: Option<String>,
}

impl DocumentMetadata {
    #[inline]
    pub fn new(source: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            source: source.into(),
            content_type,
            page: None,
            title: None,
            language: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    #[inline]
    pub fn new(content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            metadata,
        }
    }
}

/// Loads sources into documents and keeps everything loaded so far
#[derive(Debug)]
pub struct DataLoader {
    web: WebClient,
    documents: Vec<Document>,
}

impl DataLoader {
    #[inline]
    pub fn new(web_config: &WebConfig) -> Self {
        Self {
            web: WebClient::new(web_config),
            documents: Vec::new(),
        }
    }

    /// Everything loaded by this loader, in load order
    #[inline]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Load a UTF-8 text file as a single document
    #[inline]
    pub fn load_text_file(&mut self, path: &Path) -> Result<Vec<Document>> {
        debug!("Loading text file {}", path.display());

        let bytes = fs::read(path).map_err(|e| {
            AssistantError::Loader(format!("Failed to read {}: {e}", path.display()))
        })?;
        let content = String::from_utf8(bytes).map_err(|e| {
            AssistantError::Loader(format!(
                "{} is not valid UTF-8 text: {e}",
                path.display()
            ))
        })?;

        let document = Document::new(
            content,
            DocumentMetadata::new(path.display().to_string(), ContentType::Text),
        );
        Ok(self.record(vec![document]))
    }

    /// Load a PDF file, one document per page
    #[inline]
    pub fn load_pdf(&mut self, path: &Path) -> Result<Vec<Document>> {
        debug!("Loading PDF {}", path.display());

        let bytes = fs::read(path).map_err(|e| {
            AssistantError::Loader(format!("Failed to read {}: {e}", path.display()))
        })?;
        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
            AssistantError::Loader(format!(
                "Failed to extract text from {}: {e}",
                path.display()
            ))
        })?;

        let source = path.display().to_string();
        let documents: Vec<Document> = pages
            .into_iter()
            .zip(1_u32..)
            .map(|(text, page)| {
                let mut metadata = DocumentMetadata::new(source.clone(), ContentType::Pdf);
                metadata.page = Some(page);
                Document::new(text, metadata)
            })
            .collect();

        debug!("Extracted {} pages from {}", documents.len(), source);
        Ok(self.record(documents))
    }

    /// Load a web page. Failures are logged and yield no documents.
    #[inline]
    pub fn load_web_content(&mut self, url: &str) -> Vec<Document> {
        match self.web.load(url) {
            Ok(page) => {
                let mut metadata = DocumentMetadata::new(url, ContentType::Web);
                metadata.title = page.title;
                metadata.language = page.language;
                self.record(vec![Document::new(page.text, metadata)])
            }
            Err(e) => {
                error!("Error loading web content from {}: {:#}", url, e);
                Vec::new()
            }
        }
    }

    /// Load a single source according to its declared content type
    #[inline]
    pub fn load(&mut self, source: &Source) -> Result<Vec<Document>> {
        match source.content_type {
            ContentType::Text => self.load_text_file(Path::new(&source.location)),
            ContentType::Pdf => self.load_pdf(Path::new(&source.location)),
            ContentType::Web => Ok(self.load_web_content(&source.location)),
        }
    }

    /// Load every source in order and concatenate the results.
    ///
    /// The first local file failure aborts the batch.
    #[inline]
    pub fn load_multiple_sources(&mut self, sources: &[Source]) -> Result<Vec<Document>> {
        let mut all_documents = Vec::new();
        for source in sources {
            all_documents.extend(self.load(source)?);
        }

        info!(
            "Loaded {} documents from {} sources",
            all_documents.len(),
            sources.len()
        );
        Ok(all_documents)
    }

    fn record(&mut self, documents: Vec<Document>) -> Vec<Document> {
        self.documents.extend(documents.iter().cloned());
        documents
    }
}
