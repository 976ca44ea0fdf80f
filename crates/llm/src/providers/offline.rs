//! Deterministic stand-in for the model backend.
//!
//! Picks a canned reply by keyword match against the latest user message,
//! with no inference at all. Used when no API key is configured and in tests.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::provider::{LlmError, LlmProvider, Message, Role};

pub const OFFLINE_FINAL_ANSWER: &str = "Final Answer: This is a mock response in offline mode.";

pub struct OfflineProvider {
    input_dir: PathBuf,
}

impl OfflineProvider {
    pub fn new(input_dir: PathBuf) -> Self {
        Self { input_dir }
    }

    /// Reply for a single prompt.
    pub fn respond(&self, prompt: &str) -> String {
        let input_dir = self.input_dir.display();
        if prompt.contains("list_files") {
            format!("Thought: I should check the files.\nAction: list_files(\"{input_dir}\")")
        } else if prompt.contains("load_data") {
            format!(
                "Thought: I will load the data.\nAction: load_data(\"{}\")",
                self.input_dir.join("train.csv").display()
            )
        } else {
            OFFLINE_FINAL_ANSWER.to_string()
        }
    }
}

#[async_trait]
impl LlmProvider for OfflineProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        _temperature: f32,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        debug!(prompt_len = prompt.len(), "Offline provider answering");
        Ok(self.respond(prompt))
    }

    fn provider_name(&self) -> &str {
        "offline"
    }
}
