
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::index::{SearchResult, VectorStore};
use crate::llm::{ChatMessage, ChatModel};
use crate::{AssistantError, Result};

/// Answer returned for every question until an index is configured
pub const NOT_INITIALIZED_ANSWER: &str = "AI engine not properly initialized.";

/// Number of chunks retrieved as context for each question
pub const RETRIEVAL_K: usize = 3;

/// A completion plus the chunks it was conditioned on
#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

/// Retrieval-augmented question answering over one index
pub struct AnswerEngine {
    llm: Arc<dyn ChatModel>,
    store: Option<VectorStore>,
}

impl std::fmt::Debug for AnswerEngine {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerEngine")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl AnswerEngine {
    #[inline]
    pub fn new(llm: Arc<dyn ChatModel>) -> Self {
        Self { llm, store: None }
    }

    /// Answer future questions from `store`, replacing any previous index
    #[inline]
    pub fn setup_retrieval_chain(&mut self, store: VectorStore) {
        info!("Retrieval ready over index at {}", store.directory().display());
        self.store = Some(store);
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.store.is_some()
    }

    #[inline]
    pub fn vector_store(&self) -> Option<&VectorStore> {
        self.store.as_ref()
    }

    /// Retrieve the top chunks for `question` and ask the chat model to answer from them
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let Some(store) = &self.store else {
            warn!("Question asked before any documents were processed");
            return Ok(Answer {
                answer: NOT_INITIALIZED_ANSWER.to_string(),
                sources: Vec::new(),
            });
        };

        let sources = store.search(question, RETRIEVAL_K).await?;
        debug!("Retrieved {} chunks for question", sources.len());

        let context = sources.iter().map(|r| r.chunk.content.as_str()).join("\n\n");
        let messages = vec![ChatMessage::user(build_prompt(&context, question))];

        let llm = Arc::clone(&self.llm);
        let answer = tokio::task::spawn_blocking(move || llm.complete(&messages))
            .await
            .map_err(|e| AssistantError::Llm(format!("Completion task failed: {}", e)))?
            .map_err(|e| AssistantError::Llm(format!("{:#}", e)))?;

        Ok(Answer { answer, sources })
    }
}

/// Fill the question-answering prompt
#[inline]
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, \
         don't try to make up an answer.\n\n\
         Context: {context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}
