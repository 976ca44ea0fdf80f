pub mod dispatcher;
pub mod experiment_log;
pub mod literal;
pub mod registry;
pub mod tool;
pub mod tools;

pub use dispatcher::{DispatchError, ToolDispatcher};
pub use experiment_log::{ExperimentLog, ExperimentLogError, LOG_FILE_NAME};
pub use literal::{parse_args, parse_value, LiteralError};
pub use registry::{RegistryError, ToolRegistry};
pub use tool::{Tool, ToolArgs, ToolContext, ToolDefinition, ToolError, ToolOutput, ToolParam};
pub use tools::{
    ExecuteCodeTool, ListFilesTool, LoadDataTool, LogExperimentTool, SaveTextTool, SummarizeDataTool,
};

#[cfg(any(test, feature = "test-utils"))]
pub use tool::EchoTool;
