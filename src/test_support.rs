// In-process stand-ins for the embedding and chat services

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};

use crate::embeddings::Embedder;
use crate::llm::{ChatMessage, ChatModel};

pub(crate) const FAKE_DIMENSION: usize = 27;

/// Bag-of-letters embedding: one slot per ASCII letter plus a constant slot
#[derive(Debug, Default)]
pub(crate) struct FakeEmbedder {
    pub(crate) document_calls: AtomicUsize,
    pub(crate) query_calls: AtomicUsize,
}

pub(crate) fn letter_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; FAKE_DIMENSION];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        vector[usize::from(c.to_ascii_lowercase() as u8 - b'a')] += 1.0;
    }
    vector[FAKE_DIMENSION - 1] = 1.0;
    vector
}

impl Embedder for FakeEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(letter_vector(text))
    }
}

/// Embedder whose service is always down
#[derive(Debug, Default)]
pub(crate) struct UnavailableEmbedder;

impl Embedder for UnavailableEmbedder {
    fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow!("embedding service unavailable"))
    }

    fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("embedding service unavailable"))
    }
}

/// Chat model that records every request and replies with a fixed answer
#[derive(Debug)]
pub(crate) struct CannedChatModel {
    answer: String,
    pub(crate) requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl CannedChatModel {
    pub(crate) fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().map_or(0, |r| r.len())
    }

    pub(crate) fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .ok()
            .and_then(|r| r.last().and_then(|m| m.last()).map(|m| m.content.clone()))
    }
}

impl ChatModel for CannedChatModel {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        Ok(self.answer.clone())
    }
}
