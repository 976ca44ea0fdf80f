use async_trait::async_trait;
use keaa_core::WorkspaceConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// One positional parameter of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    /// Literal kind expected by the tool ("string", "integer", "dict", ...)
    pub kind: String,
    pub required: bool,
}

impl ToolParam {
    pub fn required(name: &str, kind: &str) -> Self {
        Self { name: name.to_string(), kind: kind.to_string(), required: true }
    }

    pub fn optional(name: &str, kind: &str) -> Self {
        Self { name: name.to_string(), kind: kind.to_string(), required: false }
    }
}

/// Describes a tool's interface for LLM consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "list_files", "save_text")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// Positional parameters, in call order
    pub params: Vec<ToolParam>,
}

impl ToolDefinition {
    /// Call signature as shown to the model, e.g. `load_data(filepath, nrows?)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| if p.required { p.name.clone() } else { format!("{}?", p.name) })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.signature(), self.description)
    }
}

/// What a tool hands back to the model.
///
/// `is_error` marks outputs that describe a failure the tool reported itself
/// (non-zero exit, missing directory) rather than a raised [`ToolError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }

    pub fn error_text(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: true }
    }
}

/// Context passed to tool execution: the sandbox directories.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Working directory for file writes and code execution
    pub working_directory: PathBuf,
    /// Read-only competition data
    pub input_directory: PathBuf,
    /// Where `experiment_log.json` lives
    pub experiments_directory: PathBuf,
    /// Interpreter for `execute_code`
    pub python_bin: String,
}

impl ToolContext {
    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self {
            working_directory: config.working_dir.clone(),
            input_directory: config.input_dir.clone(),
            experiments_directory: config.experiments_dir.clone(),
            python_bin: config.python_bin.clone(),
        }
    }

    /// Context rooted entirely under `dir` (tests and scratch runs).
    pub fn rooted_at(dir: &std::path::Path) -> Self {
        Self {
            working_directory: dir.to_path_buf(),
            input_directory: dir.join("input"),
            experiments_directory: dir.join("experiments"),
            python_bin: "python3".to_string(),
        }
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async. Arguments arrive as the
/// decoded positional literals of the model's call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, parameters).
    fn definition(&self) -> ToolDefinition;

    async fn execute(&self, args: ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToolError {
    /// Stable tag for logs and structured error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidInput(_) => "invalid_input",
            ToolError::ExecutionFailed(_) => "execution_failed",
            ToolError::PermissionDenied(_) => "permission_denied",
            ToolError::Timeout(_) => "timeout",
            ToolError::Other(_) => "other",
        }
    }
}

/// Positional arguments with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Vec<Value>);

impl ToolArgs {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index).filter(|v| !v.is_null())
    }

    /// Fail when more arguments were supplied than the definition allows.
    pub fn check_arity(&self, def: &ToolDefinition) -> Result<(), ToolError> {
        let required = def.params.iter().filter(|p| p.required).count();
        if self.0.len() > def.params.len() || self.0.len() < required {
            return Err(ToolError::InvalidInput(format!(
                "{} expects {} argument(s), got {}",
                def.signature(),
                if required == def.params.len() {
                    required.to_string()
                } else {
                    format!("{}-{}", required, def.params.len())
                },
                self.0.len()
            )));
        }
        Ok(())
    }

    pub fn str_at(&self, index: usize, name: &str) -> Result<&str, ToolError> {
        match self.get(index) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(ToolError::InvalidInput(format!(
                "'{name}' must be a string, got {other}"
            ))),
            None => Err(ToolError::InvalidInput(format!("missing '{name}' argument"))),
        }
    }

    /// Optional non-negative integer; floats with no fractional part are accepted.
    pub fn opt_usize_at(&self, index: usize, name: &str) -> Result<Option<usize>, ToolError> {
        match self.get(index) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .or_else(|| v.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .map(|n| Some(n as usize))
                .ok_or_else(|| {
                    ToolError::InvalidInput(format!("'{name}' must be a non-negative integer, got {v}"))
                }),
        }
    }

    pub fn object_at(&self, index: usize, name: &str) -> Result<&serde_json::Map<String, Value>, ToolError> {
        match self.get(index) {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(ToolError::InvalidInput(format!(
                "'{name}' must be a dict, got {other}"
            ))),
            None => Err(ToolError::InvalidInput(format!("missing '{name}' argument"))),
        }
    }

    /// Text rendering of a scalar: strings as-is, everything else as JSON.
    pub fn text_at(&self, index: usize, name: &str) -> Result<String, ToolError> {
        match self.get(index) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
            None => Err(ToolError::InvalidInput(format!("missing '{name}' argument"))),
        }
    }
}

impl From<Vec<Value>> for ToolArgs {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Simple echo tool for testing purposes.
#[cfg(any(test, feature = "test-utils"))]
pub struct EchoTool;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: "Echoes back the input message. For testing.".to_string(),
            params: vec![ToolParam::required("message", "string")],
        }
    }

    async fn execute(&self, args: ToolArgs, _context: &ToolContext) -> Result<ToolOutput, ToolError> {
        let message = args.str_at(0, "message")?;
        Ok(ToolOutput::text(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_marks_optional_params() {
        let def = ToolDefinition {
            name: "load_data".into(),
            description: "Load".into(),
            params: vec![ToolParam::required("filepath", "string"), ToolParam::optional("nrows", "integer")],
        };
        assert_eq!(def.signature(), "load_data(filepath, nrows?)");
        assert_eq!(def.to_string(), "load_data(filepath, nrows?): Load");
    }

    #[test]
    fn test_arity_check() {
        let def = EchoTool.definition();
        assert!(ToolArgs::new(vec![json!("hi")]).check_arity(&def).is_ok());
        assert!(ToolArgs::new(vec![]).check_arity(&def).is_err());
        let err = ToolArgs::new(vec![json!("a"), json!("b")]).check_arity(&def).unwrap_err();
        assert!(err.to_string().contains("expects 1 argument(s), got 2"));
    }

    #[test]
    fn test_typed_accessors() {
        let args = ToolArgs::new(vec![json!("train.csv"), json!(5.0), json!({"a": 1}), json!(null)]);
        assert_eq!(args.str_at(0, "filepath").unwrap(), "train.csv");
        assert_eq!(args.opt_usize_at(1, "nrows").unwrap(), Some(5));
        assert_eq!(args.object_at(2, "data").unwrap().len(), 1);
        assert_eq!(args.opt_usize_at(3, "nrows").unwrap(), None);
        assert!(args.str_at(1, "filepath").is_err());
        assert!(args.opt_usize_at(0, "nrows").is_err());
        assert_eq!(args.text_at(1, "content").unwrap(), "5.0");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ToolError::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(ToolError::Timeout(std::time::Duration::from_secs(1)).kind(), "timeout");
    }

    #[tokio::test]
    async fn test_echo_tool() {
        let ctx = ToolContext::rooted_at(std::path::Path::new("/tmp"));
        let out = EchoTool
            .execute(ToolArgs::new(vec![json!("hello world")]), &ctx)
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::text("hello world"));
    }
}
