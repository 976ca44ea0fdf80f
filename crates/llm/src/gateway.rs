//! Session-holding wrapper around an [`LlmProvider`].
//!
//! The gateway owns the conversational context of one workflow run: the
//! first `send` lazily opens a chat session (system instruction + history),
//! later calls append to it, and `reset` discards it for the next run.
//!
//! Every backend call is bounded by a timeout and retried a few times for
//! transient failures. `send` folds any remaining failure into an ordinary
//! response string (`Error: ...`), so callers cannot tell a failed call from
//! a bad model reply; `try_send` keeps the typed error for callers that care.

use std::sync::Arc;
use std::time::Duration;

use keaa_core::GeminiConfig;
use tracing::{debug, warn};

use crate::provider::{LlmError, LlmProvider, Message};

/// Prefix of the synthetic response produced when the backend fails.
pub const GATEWAY_ERROR_PREFIX: &str = "Error: ";

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// First backoff delay; doubled on every further retry.
    pub retry_base_delay: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self::from_config(&GeminiConfig::default())
    }
}

impl GatewayOptions {
    pub fn from_config(config: &GeminiConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{source} (after {attempts} attempt(s))")]
    Backend {
        #[source]
        source: LlmError,
        attempts: u32,
    },
    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
}

/// Server-side style chat context, kept client-side because the REST
/// backend is stateless.
#[derive(Debug, Default)]
struct ChatSession {
    history: Vec<Message>,
}

pub struct ModelGateway {
    provider: Arc<dyn LlmProvider>,
    system_instruction: Option<String>,
    options: GatewayOptions,
    session: Option<ChatSession>,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn LlmProvider>, options: GatewayOptions) -> Self {
        Self {
            provider,
            system_instruction: None,
            options,
            session: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Drop the current chat session; the next `send` starts a fresh one.
    pub fn reset(&mut self) {
        self.session = None;
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Messages exchanged in the current session (empty when none is open).
    pub fn history(&self) -> &[Message] {
        self.session.as_ref().map(|s| s.history.as_slice()).unwrap_or_default()
    }

    /// Send `prompt` and return the reply text, folding failures into the
    /// reply channel as `Error: <message>`.
    pub async fn send(&mut self, prompt: &str) -> String {
        match self.try_send(prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, provider = self.provider_name(), "Model call failed");
                format!("{GATEWAY_ERROR_PREFIX}{e}")
            }
        }
    }

    /// Send `prompt` within the current session.
    ///
    /// On success the prompt and reply are appended to the history; on
    /// failure the history is left untouched.
    pub async fn try_send(&mut self, prompt: &str) -> Result<String, GatewayError> {
        let session = self.session.get_or_insert_with(|| {
            debug!("Starting new chat session");
            ChatSession::default()
        });

        let mut messages = Vec::with_capacity(session.history.len() + 2);
        if let Some(system) = &self.system_instruction {
            messages.push(Message::system(system.clone()));
        }
        messages.extend(session.history.iter().cloned());
        messages.push(Message::user(prompt));

        let reply = Self::call_with_retry(self.provider.as_ref(), &self.options, messages).await?;

        session.history.push(Message::user(prompt));
        session.history.push(Message::assistant(reply.clone()));
        Ok(reply)
    }

    async fn call_with_retry(
        provider: &dyn LlmProvider,
        options: &GatewayOptions,
        messages: Vec<Message>,
    ) -> Result<String, GatewayError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let call = provider.complete(messages.clone(), options.temperature, options.max_tokens);
            let outcome = tokio::time::timeout(options.request_timeout, call).await;

            let retryable = match &outcome {
                Ok(Ok(_)) => false,
                Ok(Err(e)) => e.is_retryable(),
                Err(_) => true,
            };

            if !retryable || attempt > options.max_retries {
                return match outcome {
                    Ok(Ok(text)) => Ok(text),
                    Ok(Err(source)) => Err(GatewayError::Backend { source, attempts: attempt }),
                    Err(_) => Err(GatewayError::Timeout(options.request_timeout)),
                };
            }

            let delay = options.retry_base_delay * 2u32.saturating_pow(attempt - 1);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Retrying model call");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::ScriptedProvider;
    use crate::provider::Role;
    use async_trait::async_trait;

    fn fast_options() -> GatewayOptions {
        GatewayOptions {
            retry_base_delay: Duration::ZERO,
            ..GatewayOptions::default()
        }
    }

    fn gateway(provider: Arc<ScriptedProvider>) -> ModelGateway {
        ModelGateway::new(provider as Arc<dyn LlmProvider>, fast_options())
    }

    #[tokio::test]
    async fn test_session_created_lazily_and_reused() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_text("first");
        provider.queue_text("second");
        let mut gw = gateway(provider.clone()).with_system_instruction("sys");

        assert!(!gw.has_session());
        assert_eq!(gw.send("hello").await, "first");
        assert!(gw.has_session());
        assert_eq!(gw.send("again").await, "second");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        // system + user on the first call
        assert_eq!(requests[0].len(), 2);
        // system + user + assistant + user on the second call
        assert_eq!(requests[1].len(), 4);
        assert_eq!(requests[1][0].role, Role::System);
        assert_eq!(requests[1][2], Message::assistant("first"));
        assert_eq!(gw.history().len(), 4);
    }

    #[tokio::test]
    async fn test_reset_discards_history() {
        let provider = Arc::new(ScriptedProvider::new().with_fallback("ok"));
        let mut gw = gateway(provider.clone());
        gw.send("one").await;
        gw.reset();
        assert!(gw.history().is_empty());
        gw.send("two").await;
        assert_eq!(provider.requests()[1].len(), 1);
    }

    #[tokio::test]
    async fn test_failure_folded_into_text() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_error(LlmError::ApiError { status: 400, body: "bad request".into() });
        let mut gw = gateway(provider.clone());

        let reply = gw.send("hello").await;
        assert!(reply.starts_with(GATEWAY_ERROR_PREFIX), "got {reply}");
        assert!(reply.contains("bad request"));
        assert_eq!(provider.call_count(), 1, "400 is not retried");
        assert!(gw.history().is_empty(), "failed call leaves history untouched");
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_error(LlmError::ApiError { status: 503, body: "busy".into() });
        provider.queue_error(LlmError::ApiError { status: 429, body: "slow down".into() });
        provider.queue_text("finally");
        let mut gw = gateway(provider.clone());

        assert_eq!(gw.try_send("hello").await.unwrap(), "finally");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let provider = Arc::new(ScriptedProvider::new());
        for _ in 0..5 {
            provider.queue_error(LlmError::ApiError { status: 500, body: "boom".into() });
        }
        let mut gw = gateway(provider.clone());

        let err = gw.try_send("hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::Backend { attempts: 3, .. }));
        assert_eq!(provider.call_count(), 3);
    }

    struct HangingProvider;

    #[async_trait]
    impl LlmProvider for HangingProvider {
        async fn complete(&self, _: Vec<Message>, _: f32, _: u32) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".into())
        }

        fn provider_name(&self) -> &str {
            "hanging"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_backend_times_out() {
        let options = GatewayOptions {
            request_timeout: Duration::from_secs(5),
            max_retries: 1,
            ..fast_options()
        };
        let mut gw = ModelGateway::new(Arc::new(HangingProvider), options);

        let err = gw.try_send("hello").await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)));
        assert!(gw.send("again").await.contains("timed out"));
    }
}
