#[cfg(test)]
mod tests;

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ChatMessage, ChatModel};
use crate::config::LlmConfig;
use crate::http::{agent_with_timeout, request_with_retry};

const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Client for an OpenAI-compatible `/chat/completions` endpoint (Groq by default)
#[derive(Clone)]
pub struct GroqClient {
    endpoint: Url,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    api_key: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

impl fmt::Debug for GroqClient {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &"<redacted>")
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl GroqClient {
    #[inline]
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        config.validate().context("Invalid chat model configuration")?;

        let endpoint = Url::parse(&format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        ))
        .with_context(|| format!("Invalid chat completion URL: {}", config.base_url))?;

        Ok(Self {
            endpoint,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
            agent: agent_with_timeout(Duration::from_secs(config.timeout_seconds), None),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for GroqClient {
    #[inline]
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };
        let request_json =
            serde_json::to_string(&request).context("Failed to serialize chat request")?;

        debug!(
            "Sending {} messages to {} ({})",
            messages.len(),
            self.endpoint,
            self.model
        );

        let response_text = request_with_retry(self.endpoint.as_str(), self.retry_attempts, || {
            self.agent
                .post(self.endpoint.as_str())
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .context("Chat completion request failed")?;

        let response: ChatResponse =
            serde_json::from_str(&response_text).context("Failed to parse chat response")?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))?;

        debug!("Received completion of {} chars", answer.len());
        Ok(answer)
    }
}
