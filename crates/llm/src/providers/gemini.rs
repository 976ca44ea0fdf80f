use async_trait::async_trait;
use keaa_core::GeminiConfig;
use serde_json::json;
use tracing::debug;

use crate::provider::{LlmError, LlmProvider, Message, Role};

const SAFETY_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    top_p: f32,
    top_k: u32,
    json_mode: bool,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        let defaults = GeminiConfig::default();
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: defaults.base_url,
            top_p: defaults.top_p,
            top_k: defaults.top_k,
            json_mode: false,
        }
    }

    pub fn from_config(config: &GeminiConfig, api_key: String) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            top_p: config.top_p,
            top_k: config.top_k,
            ..Self::new(api_key, config.model_name.clone())
        }
    }

    /// Ask the backend for `application/json` output.
    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    /// Build the request body for the Gemini generateContent API.
    fn build_request_body(&self, messages: &[Message], temperature: f32, max_tokens: u32) -> serde_json::Value {
        // Gemini uses a separate system_instruction field (like Claude)
        let system_msg = messages
            .iter()
            .find(|m| matches!(m.role, Role::System))
            .map(|m| m.content.clone());

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| !matches!(m.role, Role::System))
            .map(|m| {
                json!({
                    "role": match m.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                        Role::System => unreachable!(),
                    },
                    "parts": [{ "text": m.content }],
                })
            })
            .collect();

        let safety: Vec<serde_json::Value> = SAFETY_CATEGORIES
            .iter()
            .map(|c| json!({ "category": c, "threshold": "BLOCK_MEDIUM_AND_ABOVE" }))
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": temperature,
                "topP": self.top_p,
                "topK": self.top_k,
                "maxOutputTokens": max_tokens,
            },
            "safetySettings": safety,
        });

        if self.json_mode {
            body["generationConfig"]["responseMimeType"] = json!("application/json");
        }

        if let Some(system) = system_msg {
            body["system_instruction"] = json!({
                "parts": [{ "text": system }],
            });
        }

        body
    }

    /// Pull the reply text out of a generateContent response.
    ///
    /// Multi-part candidates are concatenated; a candidate without text (for
    /// example a safety block) is reported with its finish reason.
    fn extract_text(resp: &serde_json::Value) -> Result<String, LlmError> {
        let candidate = &resp["candidates"][0];
        let text: String = candidate["content"]["parts"]
            .as_array()
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate["finishReason"]
                .as_str()
                .or_else(|| resp["promptFeedback"]["blockReason"].as_str())
                .unwrap_or("unknown");
            return Err(LlmError::ParseError(format!(
                "missing candidates[0].content.parts[].text (finish reason: {reason})"
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key,
        );

        let body = self.build_request_body(&messages, temperature, max_tokens);

        debug!("Gemini request to model={}", self.model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        Self::extract_text(&resp)
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}
