use std::sync::Arc;
use std::time::Duration;

use keaa_agent::{load_system_prompt, ResponseFormat};
use keaa_core::Config;
use keaa_llm::{GatewayOptions, LlmProvider, ModelGateway};
use keaa_tool_runtime::{ExperimentLog, RegistryError, ToolContext, ToolDispatcher, ToolRegistry};

/// Shared, read-only server state. Each chat request opens its own gateway
/// session over the shared provider.
pub struct AppState {
    pub config: Config,
    pub provider: Arc<dyn LlmProvider>,
    pub dispatcher: ToolDispatcher,
    pub experiments: ExperimentLog,
    pub system_prompt: String,
    pub offline: bool,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn LlmProvider>) -> Result<Self, RegistryError> {
        let registry = Arc::new(ToolRegistry::with_builtin_tools()?);
        let system_prompt = load_system_prompt(
            &registry,
            ResponseFormat::Json,
            config.agent.system_instructions_path.as_deref(),
        );
        let dispatcher = ToolDispatcher::new(registry, ToolContext::from_config(&config.workspace))
            .with_timeout(Duration::from_secs(config.agent.tool_timeout_secs));

        Ok(Self {
            offline: config.is_offline(),
            experiments: ExperimentLog::new(&config.workspace.experiments_dir),
            provider,
            dispatcher,
            system_prompt,
            config,
        })
    }

    /// Fresh single-request chat session.
    pub fn gateway(&self) -> ModelGateway {
        ModelGateway::new(self.provider.clone(), GatewayOptions::from_config(&self.config.gemini))
            .with_system_instruction(self.system_prompt.clone())
    }

    pub fn mode(&self) -> &'static str {
        if self.offline {
            "offline"
        } else {
            "online"
        }
    }
}
