//! Recursive directory listing.

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use crate::tool::{Tool, ToolArgs, ToolContext, ToolDefinition, ToolError, ToolOutput, ToolParam};

/// List every file under a directory, rendered as a JSON array of paths.
pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_files".to_string(),
            description: "Recursively list all files in a directory.".to_string(),
            params: vec![ToolParam::required("directory", "string")],
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let directory = args.str_at(0, "directory")?.to_string();
        let root = super::resolve(&context.working_directory, &directory);

        if !root.exists() {
            let listing = vec![format!("Error: Directory '{directory}' does not exist.")];
            return Ok(ToolOutput::error_text(serde_json::to_string(&listing).map_err(anyhow::Error::from)?));
        }

        let files = tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.path().display().to_string())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("listing task failed: {e}")))?;

        debug!(directory = %directory, count = files.len(), "Listed files");
        let json = serde_json::to_string(&files).map_err(anyhow::Error::from)?;
        Ok(ToolOutput::text(json))
    }
}
