use crate::tool::{Tool, ToolDefinition};
use crate::tools;
use indexmap::IndexMap;
use std::sync::Arc;

/// Manages available tools, their definitions, and lookup.
///
/// Built once at startup and shared read-only; registration order is kept so
/// prompts list tools deterministically.
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
        }
    }

    /// Registry holding the six sandbox tools.
    pub fn with_builtin_tools() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(tools::ListFilesTool)?;
        registry.register(tools::LoadDataTool)?;
        registry.register(tools::SummarizeDataTool)?;
        registry.register(tools::ExecuteCodeTool::default())?;
        registry.register(tools::LogExperimentTool)?;
        registry.register(tools::SaveTextTool)?;
        Ok(registry)
    }

    /// Register a tool. Returns error if name already registered.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        let def = tool.definition();
        if self.tools.contains_key(&def.name) {
            return Err(RegistryError::DuplicateName(def.name));
        }
        self.tools.insert(def.name, Arc::new(tool));
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool definitions (for the system prompt).
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool with name '{0}' is already registered")]
    DuplicateName(String),
}
