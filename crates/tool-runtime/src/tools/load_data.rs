use async_trait::async_trait;
use tracing::info;

use super::frame::{self, DataFormat};
use crate::tool::{Tool, ToolArgs, ToolContext, ToolDefinition, ToolError, ToolOutput, ToolParam};

/// Load a CSV or Parquet file and report its shape, schema and first rows.
pub struct LoadDataTool;

#[async_trait]
impl Tool for LoadDataTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "load_data".to_string(),
            description: "Load a CSV or Parquet file and show its shape, column info and first 5 rows. \
                          Optionally read only the first nrows rows."
                .to_string(),
            params: vec![
                ToolParam::required("filepath", "string"),
                ToolParam::optional("nrows", "integer"),
            ],
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let filepath = args.str_at(0, "filepath")?.to_string();
        let nrows = args.opt_usize_at(1, "nrows")?;

        let format = DataFormat::detect(&filepath).ok_or_else(|| {
            ToolError::InvalidInput(format!(
                "Unsupported file format for '{filepath}'. Use CSV or Parquet."
            ))
        })?;
        let path = super::resolve(&context.working_directory, &filepath);

        let frame = tokio::task::spawn_blocking(move || frame::read_frame(&path, format, nrows))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("load task failed: {e}")))??;

        info!(filepath = %filepath, rows = frame.num_rows(), columns = frame.num_columns(), "Loaded data");
        Ok(ToolOutput::text(format!(
            "Successfully loaded '{filepath}'.\nShape: {}\n\nInfo:\n{}\n\nFirst 5 rows:\n{}",
            frame::shape(&frame),
            frame::info(&frame),
            frame::head(&frame, 5)?
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::frame::test_data;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_data::write_csv(dir.path()).display().to_string();
        let ctx = ToolContext::rooted_at(dir.path());

        let out = LoadDataTool.execute(ToolArgs::new(vec![json!(path)]), &ctx).await.unwrap();
        assert!(out.content.starts_with(&format!("Successfully loaded '{path}'.\nShape: (4, 4)")));
        assert!(out.content.contains("\n\nInfo:\n"));
        assert!(out.content.contains("Braund"));
        assert!(out.content.contains("\n\nFirst 5 rows:\n"));
    }

    #[tokio::test]
    async fn test_load_with_nrows() {
        let dir = tempfile::tempdir().unwrap();
        test_data::write_csv(dir.path());
        let ctx = ToolContext::rooted_at(dir.path());

        let out = LoadDataTool
            .execute(ToolArgs::new(vec![json!("train.csv"), json!(2)]), &ctx)
            .await
            .unwrap();
        assert!(out.content.contains("Shape: (2, 4)"));
        assert!(!out.content.contains("Heikkinen"));
    }

    #[tokio::test]
    async fn test_load_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let path = test_data::write_parquet(dir.path()).display().to_string();
        let ctx = ToolContext::rooted_at(dir.path());

        let out = LoadDataTool
            .execute(ToolArgs::new(vec![json!(path), json!(3)]), &ctx)
            .await
            .unwrap();
        assert!(out.content.contains("Shape: (3, 3)"));
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted_at(dir.path());
        let err = LoadDataTool
            .execute(ToolArgs::new(vec![json!("notes.txt")]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
        assert!(err.to_string().contains("Use CSV or Parquet"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::rooted_at(dir.path());
        let err = LoadDataTool
            .execute(ToolArgs::new(vec![json!("absent.csv")]), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "execution_failed");
    }
}
