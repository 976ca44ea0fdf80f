use async_trait::async_trait;

use crate::experiment_log::ExperimentLog;
use crate::tool::{Tool, ToolArgs, ToolContext, ToolDefinition, ToolError, ToolOutput, ToolParam};

/// Append a record to `experiment_log.json` in the experiments directory.
pub struct LogExperimentTool;

#[async_trait]
impl Tool for LogExperimentTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "log_experiment".to_string(),
            description: "Record an experiment (a dict of model, parameters, scores, notes) in the experiment log."
                .to_string(),
            params: vec![ToolParam::required("experiment_data", "dict")],
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let entry = args.object_at(0, "experiment_data")?.clone();
        let log = ExperimentLog::new(&context.experiments_directory);
        let path = log.path();

        tokio::task::spawn_blocking(move || log.append(entry))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("log task failed: {e}")))?
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        Ok(ToolOutput::text(format!(
            "Experiment logged successfully to {}.",
            path.display()
        )))
    }
}
