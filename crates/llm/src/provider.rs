use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat message for the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Trait for LLM providers. Each backend implements this.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and return the assistant's response text.
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;

    /// Provider name for logging (e.g., "gemini", "offline").
    fn provider_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    ParseError(String),
    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Transport failures, rate limits and server-side errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(_) => true,
            LlmError::ApiError { status, .. } => *status == 429 || *status >= 500,
            LlmError::ParseError(_) | LlmError::NotConfigured(_) => false,
        }
    }
}

/// Scripted provider for exercising the gateway and agent loop without a backend.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns queued replies in FIFO order and records every request.
    ///
    /// When the queue is empty, `fallback` is returned (if set) or a
    /// `ParseError` is raised.
    pub struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        fallback: Option<String>,
        requests: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        pub fn new() -> Self {
            Self {
                replies: Mutex::new(VecDeque::new()),
                fallback: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Reply with `text` forever once the queue is drained.
        pub fn with_fallback(mut self, text: &str) -> Self {
            self.fallback = Some(text.to_string());
            self
        }

        pub fn queue_text(&self, text: &str) {
            self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        }

        pub fn queue_error(&self, error: LlmError) {
            self.replies.lock().unwrap().push_back(Err(error));
        }

        /// Number of `complete` calls received so far.
        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Messages sent on each call, in call order.
        pub fn requests(&self) -> Vec<Vec<Message>> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Default for ScriptedProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<Message>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(messages);
            match self.replies.lock().unwrap().pop_front() {
                Some(reply) => reply,
                None => self
                    .fallback
                    .clone()
                    .ok_or_else(|| LlmError::ParseError("scripted provider exhausted".into())),
            }
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }
}
