use async_trait::async_trait;
use tracing::info;

use super::frame::{self, DataFormat};
use crate::tool::{Tool, ToolArgs, ToolContext, ToolDefinition, ToolError, ToolOutput, ToolParam};

/// Descriptive statistics and missing-value counts for a whole file.
pub struct SummarizeDataTool;

#[async_trait]
impl Tool for SummarizeDataTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "summarize_data".to_string(),
            description: "Show descriptive statistics and missing-value counts for a CSV or Parquet file."
                .to_string(),
            params: vec![ToolParam::required("filepath", "string")],
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let filepath = args.str_at(0, "filepath")?.to_string();
        let format = DataFormat::detect(&filepath)
            .ok_or_else(|| ToolError::InvalidInput("Unsupported file format.".to_string()))?;
        let path = super::resolve(&context.working_directory, &filepath);

        let (describe, missing) = tokio::task::spawn_blocking(move || {
            let frame = frame::read_frame(&path, format, None)?;
            Ok::<_, ToolError>((frame::describe(&frame)?, frame::missing_values(&frame)))
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("summarize task failed: {e}")))??;

        info!(filepath = %filepath, "Summarized data");
        Ok(ToolOutput::text(format!(
            "Descriptive Statistics:\n{describe}\n\nMissing Values:\n{missing}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::frame::test_data;
    use serde_json::json;

    #[tokio::test]
    async fn test_summarize_csv() {
        let dir = tempfile::tempdir().unwrap();
        test_data::write_csv(dir.path());
        let ctx = ToolContext::rooted_at(dir.path());

        let out = SummarizeDataTool
            .execute(ToolArgs::new(vec![json!("train.csv")]), &ctx)
            .await
            .unwrap();
        assert!(out.content.starts_with("Descriptive Statistics:\n"));
        assert!(out.content.contains("\n\nMissing Values:\n"));
        assert!(out.content.contains("mean"));
        assert!(out.content.contains("unique"));
    }

    #[tokio::test]
    async fn test_summarize_parquet() {
        let dir = tempfile::tempdir().unwrap();
        test_data::write_parquet(dir.path());
        let ctx = ToolContext::rooted_at(dir.path());

        let out = SummarizeDataTool
            .execute(ToolArgs::new(vec![json!("scores.parquet")]), &ctx)
            .await
            .unwrap();
        let missing = out.content.split("Missing Values:\n").nth(1).unwrap();
        assert!(missing.lines().any(|l| l.starts_with("score") && l.ends_with('1')));
    }

    #[tokio::test]
    async fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted_at(dir.path());
        let err = SummarizeDataTool
            .execute(ToolArgs::new(vec![json!("data.xlsx")]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Unsupported file format.");
    }
}
