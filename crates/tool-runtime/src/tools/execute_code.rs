//! Python code execution in the working directory.
//!
//! The code runs in a fresh interpreter process; nothing persists between
//! calls except files the code writes itself. `pd`, `np`, `os` and `json` are
//! imported before the snippet runs (pandas and numpy only when installed).

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::tool::{Tool, ToolArgs, ToolContext, ToolDefinition, ToolError, ToolOutput, ToolParam};

const PRELUDE: &str = "\
try:
    import pandas as pd
except ImportError:
    pass
try:
    import numpy as np
except ImportError:
    pass
import os, json
";

pub struct ExecuteCodeTool {
    prelude: bool,
}

impl Default for ExecuteCodeTool {
    fn default() -> Self {
        Self { prelude: true }
    }
}

impl ExecuteCodeTool {
    /// Run snippets exactly as given, for interpreters other than Python.
    pub fn without_prelude() -> Self {
        Self { prelude: false }
    }

    fn program(&self, code: &str) -> String {
        if self.prelude {
            format!("{PRELUDE}{code}")
        } else {
            code.to_string()
        }
    }
}

#[async_trait]
impl Tool for ExecuteCodeTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "execute_code".to_string(),
            description: "Execute Python code in the working directory and return its printed output. \
                          Each call runs in a fresh interpreter."
                .to_string(),
            params: vec![ToolParam::required("code", "string")],
        }
    }

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let code = args.str_at(0, "code")?;

        tokio::fs::create_dir_all(&context.working_directory).await.map_err(|e| {
            ToolError::ExecutionFailed(format!(
                "failed to create working directory '{}': {e}",
                context.working_directory.display()
            ))
        })?;

        debug!(interpreter = %context.python_bin, bytes = code.len(), "Executing code");

        // Dropping the future on dispatcher timeout must not leave the child running.
        let output = Command::new(&context.python_bin)
            .arg("-c")
            .arg(self.program(code))
            .current_dir(&context.working_directory)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ToolError::ExecutionFailed(format!("failed to spawn '{}': {e}", context.python_bin))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            Ok(ToolOutput::text(format!("Execution Success:\n{stdout}")))
        } else {
            warn!(code = ?output.status.code(), "Code execution failed");
            Ok(ToolOutput::error_text(format!("Execution Error:\n{stderr}")))
        }
    }
}
