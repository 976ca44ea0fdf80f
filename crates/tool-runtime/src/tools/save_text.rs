//! Text file writing inside the working directory.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::tool::{Tool, ToolArgs, ToolContext, ToolDefinition, ToolError, ToolOutput, ToolParam};

/// Write text to a file under the working directory, creating parent directories as needed.
pub struct SaveTextTool;

impl SaveTextTool {
    /// Reject traversal and absolute paths; the result always lies under `base`.
    fn safe_resolve(base: &Path, requested: &str) -> Result<PathBuf, ToolError> {
        let candidate = Path::new(requested);
        if candidate.components().any(|c| c == Component::ParentDir) {
            return Err(ToolError::PermissionDenied("path traversal ('..') not allowed".to_string()));
        }
        if candidate.is_absolute() {
            return Err(ToolError::PermissionDenied(format!(
                "'{requested}' must be relative to the working directory"
            )));
        }
        if requested.trim().is_empty() {
            return Err(ToolError::InvalidInput("filename must not be empty".to_string()));
        }
        Ok(base.join(candidate))
    }
}

#[async_trait]
impl Tool for SaveTextTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "save_text".to_string(),
            description: "Save text content (notes, scripts, submissions) to a file in the working directory."
                .to_string(),
            params: vec![ToolParam::required("filename", "string"), ToolParam::required("content", "string")],
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let filename = args.str_at(0, "filename")?;
        let content = args.text_at(1, "content")?;
        let path = Self::safe_resolve(&context.working_directory, filename)?;

        debug!(path = %path.display(), bytes = content.len(), "Saving text");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::ExecutionFailed(format!(
                    "failed to create parent directories for '{}': {e}",
                    path.display()
                ))
            })?;
        }

        tokio::fs::write(&path, content.as_bytes())
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to write '{}': {e}", path.display())))?;

        Ok(ToolOutput::text(format!("File saved to {}.", path.display())))
    }
}
