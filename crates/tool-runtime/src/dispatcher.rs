use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::literal::{self, LiteralError};
use crate::registry::ToolRegistry;
use crate::tool::{ToolArgs, ToolContext, ToolError, ToolOutput};

/// Resolves a tool call by name, decodes its literal arguments, runs it, and
/// reports the outcome.
///
/// `dispatch` keeps failures typed; `execute` renders everything as the
/// observation string fed back to the model and never fails.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
    timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Tool '{0}' not found.")]
    UnknownTool(String),
    #[error("invalid arguments for '{tool}': {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: LiteralError,
    },
    #[error("{source}")]
    Tool {
        tool: String,
        #[source]
        source: ToolError,
    },
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::UnknownTool(_) => "unknown_tool",
            DispatchError::InvalidArguments { .. } => "invalid_arguments",
            DispatchError::Tool { source, .. } => source.kind(),
        }
    }

    /// Observation text shown to the model.
    pub fn to_observation(&self) -> String {
        match self {
            DispatchError::UnknownTool(name) => format!("Error: Tool '{name}' not found."),
            DispatchError::InvalidArguments { tool, source } => {
                format!("Error executing tool '{tool}': invalid arguments: {source}")
            }
            DispatchError::Tool { tool, source } => format!("Error executing tool '{tool}': {source}"),
        }
    }
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, context: ToolContext) -> Self {
        Self {
            registry,
            context,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run `name` with `raw_args` and return the observation string.
    pub async fn execute(&self, name: &str, raw_args: &str) -> String {
        match self.dispatch(name, raw_args).await {
            Ok(output) => output.content,
            Err(e) => {
                warn!(tool = name, kind = e.kind(), error = %e, "Tool call failed");
                e.to_observation()
            }
        }
    }

    /// Run `name` with `raw_args`, keeping failures typed.
    pub async fn dispatch(&self, name: &str, raw_args: &str) -> Result<ToolOutput, DispatchError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        let values = literal::parse_args(raw_args).map_err(|source| DispatchError::InvalidArguments {
            tool: name.to_string(),
            source,
        })?;
        self.run(name, tool.as_ref(), ToolArgs::new(values)).await
    }

    /// Run `name` with already-decoded arguments (JSON tool calls).
    pub async fn dispatch_values(
        &self,
        name: &str,
        values: Vec<serde_json::Value>,
    ) -> Result<ToolOutput, DispatchError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;
        self.run(name, tool.as_ref(), ToolArgs::new(values)).await
    }

    async fn run(
        &self,
        name: &str,
        tool: &dyn crate::tool::Tool,
        args: ToolArgs,
    ) -> Result<ToolOutput, DispatchError> {
        let wrap = |source: ToolError| DispatchError::Tool { tool: name.to_string(), source };

        args.check_arity(&tool.definition()).map_err(wrap)?;
        info!(tool = name, args = args.len(), "Executing tool");

        let output = match tokio::time::timeout(self.timeout, tool.execute(args, &self.context)).await {
            Ok(result) => result.map_err(wrap)?,
            Err(_) => return Err(wrap(ToolError::Timeout(self.timeout))),
        };

        debug!(tool = name, bytes = output.content.len(), is_error = output.is_error, "Tool finished");
        if output.content.is_empty() {
            return Ok(ToolOutput { content: "(no output)".to_string(), ..output });
        }
        Ok(output)
    }
}
