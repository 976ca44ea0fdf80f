pub mod config;
pub mod error;

pub use config::{AgentConfig, Config, GeminiConfig, ServerConfig, WorkspaceConfig};
pub use error::*;
