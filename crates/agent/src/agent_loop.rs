use std::sync::Arc;
use std::time::Duration;

use keaa_core::Config;
use keaa_llm::{GatewayOptions, LlmProvider, ModelGateway};
use keaa_tool_runtime::{RegistryError, ToolContext, ToolDispatcher, ToolRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::parser::{self, AgentAction, ParseStrictness};
use crate::prompt::{self, ResponseFormat};

/// Sent after a reply that was neither a tool call nor a final answer.
pub const CONTINUE_PROMPT: &str =
    "Please continue. If you need to use a tool, specify Action: tool_name(args). If done, say Final Answer: ...";

/// How a workflow run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "final_answer", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Done(String),
    /// The step bound was reached without a final answer.
    StepExhausted,
}

/// One reason/act/observe step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub response: String,
    pub action: AgentAction,
    /// Full tool output when the step called a tool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub goal: String,
    pub outcome: WorkflowOutcome,
    pub steps: usize,
    pub transcript: Vec<StepRecord>,
}

impl WorkflowReport {
    pub fn final_answer(&self) -> Option<&str> {
        match &self.outcome {
            WorkflowOutcome::Done(text) => Some(text),
            WorkflowOutcome::StepExhausted => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("failed to build tool registry: {0}")]
    Registry(#[from] RegistryError),
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn truncate_for_display(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

type StepObserver = Box<dyn Fn(&StepRecord) + Send + Sync>;

/// Step-bounded reason/act/observe loop.
///
/// Flow: goal -> model -> parse -> tool -> observation -> model -> ... until
/// a final answer or `max_steps` model calls.
pub struct AgentLoop {
    gateway: ModelGateway,
    dispatcher: ToolDispatcher,
    max_steps: usize,
    strictness: ParseStrictness,
    display_truncate: usize,
    observer: Option<StepObserver>,
}

impl AgentLoop {
    pub fn new(gateway: ModelGateway, dispatcher: ToolDispatcher) -> Self {
        Self {
            gateway,
            dispatcher,
            max_steps: 10,
            strictness: ParseStrictness::Lenient,
            display_truncate: 500,
            observer: None,
        }
    }

    /// Wire the loop from configuration: built-in tools, line-prefixed
    /// prompt, gateway and dispatcher options.
    pub fn from_config(config: &Config, provider: Arc<dyn LlmProvider>) -> Result<Self, AgentError> {
        let registry = Arc::new(ToolRegistry::with_builtin_tools()?);
        let system_prompt = prompt::load_system_prompt(
            &registry,
            ResponseFormat::LinePrefixed,
            config.agent.system_instructions_path.as_deref(),
        );

        let gateway = ModelGateway::new(provider, GatewayOptions::from_config(&config.gemini))
            .with_system_instruction(system_prompt);
        let dispatcher = ToolDispatcher::new(registry, ToolContext::from_config(&config.workspace))
            .with_timeout(Duration::from_secs(config.agent.tool_timeout_secs));

        let strictness = if config.agent.strict_actions {
            ParseStrictness::Strict
        } else {
            ParseStrictness::Lenient
        };

        Ok(Self::new(gateway, dispatcher)
            .with_max_steps(config.agent.max_steps)
            .with_strictness(strictness)
            .with_display_truncate(config.agent.display_truncate))
    }

    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_strictness(mut self, strictness: ParseStrictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_display_truncate(mut self, max_chars: usize) -> Self {
        self.display_truncate = max_chars;
        self
    }

    /// Called after every step, e.g. to print progress.
    pub fn with_observer(mut self, observer: impl Fn(&StepRecord) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Run one workflow for `goal` in a fresh chat session.
    pub async fn run_workflow(&mut self, goal: &str) -> WorkflowReport {
        self.gateway.reset();
        info!(goal, max_steps = self.max_steps, provider = self.gateway.provider_name(), "Starting agent session");

        let mut input = format!("User Goal: {goal}\nPlease start by listing files or planning your approach.");
        let mut transcript = Vec::new();
        let mut step = 0usize;
        let mut outcome = WorkflowOutcome::StepExhausted;

        while step < self.max_steps {
            step += 1;
            debug!(step, "Starting agent step");

            let response = self.gateway.send(&input).await;
            let parsed = parser::parse_with(&response, self.strictness);
            if let Some(thought) = &parsed.thought {
                debug!(step, thought = %thought, "Model thought");
            }

            let mut observation = None;
            let mut finished = None;
            match &parsed.action {
                AgentAction::FinalAnswer { text } => {
                    info!(step, "Final answer received");
                    finished = Some(text.clone());
                }
                AgentAction::ToolCall { name, raw_args } => {
                    info!(step, tool = %name, "Tool call");
                    let result = self.dispatcher.execute(name, raw_args).await;
                    debug!(step, output = %truncate_for_display(&result, self.display_truncate), "Tool output");
                    input = format!("Observation: {result}");
                    observation = Some(result);
                }
                AgentAction::PlainText { .. } => {
                    input = match &parsed.malformed_action {
                        Some(line) => {
                            warn!(step, line = %line, "Malformed action line");
                            format!(
                                "Your action line could not be parsed: `{line}`. \
                                 Use exactly `Action: tool_name(arg1, arg2)` with the arguments in parentheses, \
                                 or say Final Answer: ..."
                            )
                        }
                        None => CONTINUE_PROMPT.to_string(),
                    };
                }
            }

            let record = StepRecord { step, response, action: parsed.action, observation };
            if let Some(observer) = &self.observer {
                observer(&record);
            }
            transcript.push(record);

            if let Some(text) = finished {
                outcome = WorkflowOutcome::Done(text);
                break;
            }
        }

        if outcome == WorkflowOutcome::StepExhausted {
            warn!(steps = step, "Max steps reached without a final answer");
        }

        WorkflowReport { goal: goal.to_string(), outcome, steps: step, transcript }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keaa_llm::provider::mock::ScriptedProvider;
    use keaa_llm::{LlmError, Role};
    use keaa_tool_runtime::ExecuteCodeTool;
    use std::sync::Mutex;

    fn agent(provider: Arc<ScriptedProvider>, dir: &std::path::Path) -> AgentLoop {
        let registry = Arc::new(ToolRegistry::with_builtin_tools().unwrap());
        let dispatcher = ToolDispatcher::new(registry, ToolContext::rooted_at(dir));
        let options = GatewayOptions { retry_base_delay: Duration::ZERO, ..GatewayOptions::default() };
        AgentLoop::new(ModelGateway::new(provider, options), dispatcher)
    }

    fn last_user_message(request: &[keaa_llm::Message]) -> &str {
        let last = request.last().unwrap();
        assert_eq!(last.role, Role::User);
        &last.content
    }

    #[tokio::test]
    async fn test_plain_text_exhausts_steps() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new().with_fallback("Let me think about it."));
        let mut agent = agent(provider.clone(), dir.path()).with_max_steps(3);

        let report = agent.run_workflow("Predict survival").await;

        assert_eq!(report.outcome, WorkflowOutcome::StepExhausted);
        assert_eq!(report.steps, 3);
        assert_eq!(provider.call_count(), 3);
        let requests = provider.requests();
        assert_eq!(
            last_user_message(&requests[0]),
            "User Goal: Predict survival\nPlease start by listing files or planning your approach."
        );
        assert_eq!(last_user_message(&requests[1]), CONTINUE_PROMPT);
        assert_eq!(last_user_message(&requests[2]), CONTINUE_PROMPT);
    }

    #[tokio::test]
    async fn test_tool_then_final_answer() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_text("Thought: write notes\nAction: save_text('notes.txt', 'hello')");
        provider.queue_text("Final Answer: done");
        let mut agent = agent(provider.clone(), dir.path());

        let report = agent.run_workflow("Take notes").await;

        assert_eq!(report.outcome, WorkflowOutcome::Done("done".into()));
        assert_eq!(report.final_answer(), Some("done"));
        assert_eq!(report.steps, 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(), "hello");

        let observation = report.transcript[0].observation.as_deref().unwrap();
        assert!(observation.starts_with("File saved to "));
        assert_eq!(last_user_message(&provider.requests()[1]), format!("Observation: {observation}"));
        assert!(report.transcript[1].observation.is_none());
    }

    #[tokio::test]
    async fn test_observation_is_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new().with_fallback("Final Answer: ok"));
        provider.queue_text("Action: execute_code('yes x | head -n 600')");

        let ctx = ToolContext { python_bin: "sh".into(), ..ToolContext::rooted_at(dir.path()) };
        let mut registry = ToolRegistry::new();
        registry.register(ExecuteCodeTool::without_prelude()).unwrap();
        let registry = Arc::new(registry);
        let gateway = ModelGateway::new(provider.clone(), GatewayOptions::default());
        let mut agent = AgentLoop::new(gateway, ToolDispatcher::new(registry, ctx)).with_display_truncate(10);

        let report = agent.run_workflow("Long output").await;
        assert_eq!(report.steps, 2);
        let observation = report.transcript[0].observation.as_deref().unwrap();
        assert_eq!(observation, format!("Execution Success:\n{}", "x\n".repeat(600)));
        assert_eq!(last_user_message(&provider.requests()[1]), format!("Observation: {observation}"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_observed_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new().with_fallback("Final Answer: gave up"));
        provider.queue_text("Action: train_model('xgb')");
        let mut agent = agent(provider.clone(), dir.path());

        let report = agent.run_workflow("Train").await;
        assert_eq!(report.steps, 2);
        assert_eq!(
            last_user_message(&provider.requests()[1]),
            "Observation: Error: Tool 'train_model' not found."
        );
    }

    #[tokio::test]
    async fn test_backend_error_reprompts() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new());
        provider.queue_error(LlmError::ApiError { status: 400, body: "bad".into() });
        provider.queue_text("Final Answer: recovered");
        let mut agent = agent(provider.clone(), dir.path());

        let report = agent.run_workflow("Anything").await;
        assert_eq!(report.outcome, WorkflowOutcome::Done("recovered".into()));
        assert!(report.transcript[0].response.starts_with("Error: "));
        assert_eq!(last_user_message(&provider.requests()[1]), CONTINUE_PROMPT);
    }

    #[tokio::test]
    async fn test_strict_mode_targets_malformed_line() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new().with_fallback("Final Answer: ok"));
        provider.queue_text("Action: list_files('/kaggle/input'");
        let mut agent = agent(provider.clone(), dir.path()).with_strictness(ParseStrictness::Strict);

        agent.run_workflow("List").await;
        let reprompt = last_user_message(&provider.requests()[1]).to_string();
        assert!(reprompt.contains("`Action: list_files('/kaggle/input'`"), "{reprompt}");
    }

    #[tokio::test]
    async fn test_each_run_starts_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new().with_fallback("Final Answer: ok"));
        let mut agent = agent(provider.clone(), dir.path());

        agent.run_workflow("first").await;
        agent.run_workflow("second").await;

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].len(), 1, "history from the first run must be gone");
    }

    #[tokio::test]
    async fn test_observer_sees_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new().with_fallback("thinking"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut agent = agent(provider, dir.path())
            .with_max_steps(2)
            .with_observer(move |record| sink.lock().unwrap().push(record.step));

        agent.run_workflow("Observe").await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_from_config_applies_agent_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.agent.max_steps = 1;
        config.workspace.working_dir = dir.path().to_path_buf();
        let provider = Arc::new(ScriptedProvider::new().with_fallback("still thinking"));

        let mut agent = AgentLoop::from_config(&config, provider.clone()).unwrap();
        let report = agent.run_workflow("One step").await;
        assert_eq!(report.outcome, WorkflowOutcome::StepExhausted);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(provider.requests()[0][0].role, Role::System);
    }

    #[test]
    fn test_truncate_for_display() {
        assert_eq!(truncate_for_display("short", 500), "short");
        assert_eq!(truncate_for_display(&"a".repeat(501), 500), format!("{}...", "a".repeat(500)));
        assert_eq!(truncate_for_display("héllo", 2), "hé...");
    }

    #[test]
    fn test_report_serializes_outcome() {
        let report = WorkflowReport {
            goal: "g".into(),
            outcome: WorkflowOutcome::Done("fin".into()),
            steps: 1,
            transcript: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"]["status"], "done");
        assert_eq!(json["outcome"]["final_answer"], "fin");

        let exhausted = serde_json::to_value(WorkflowOutcome::StepExhausted).unwrap();
        assert_eq!(exhausted["status"], "step_exhausted");
    }
}
