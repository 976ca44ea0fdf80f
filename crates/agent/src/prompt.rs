//! System instructions sent with every chat session.

use std::path::Path;

use keaa_tool_runtime::ToolRegistry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Reply shape the model is asked to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    /// `Thought:` / `Action:` / `Final Answer:` lines (step loop).
    #[default]
    LinePrefixed,
    /// One JSON object per reply (chat endpoint).
    Json,
}

fn tool_list(registry: &ToolRegistry) -> String {
    registry
        .list()
        .iter()
        .map(|def| format!("- `{}`: {}", def.signature(), def.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the system prompt listing the registry's tools.
pub fn build_system_prompt(registry: &ToolRegistry, format: ResponseFormat) -> String {
    let tools = tool_list(registry);

    let response_format = match format {
        ResponseFormat::LinePrefixed => r#"## Response Format

Reply with one step at a time using these line prefixes:

Thought: <your reasoning about what to do next>
Action: tool_name(arg1, arg2)

Arguments are Python-style literals only: quoted strings, numbers, True/False/None,
lists and dicts. Do not use variables, expressions or keyword arguments.
After each Action you will receive `Observation: <tool output>`.

When the goal is achieved, reply with a single line:

Final Answer: <summary of what you did, the results and the recommended next steps>"#,
        ResponseFormat::Json => r#"## Response Format

Respond with exactly one JSON object and nothing else:

{"thought": "<reasoning>", "tool_name": "<tool>", "tool_args": [<positional arguments>]}

or, when you can answer directly:

{"thought": "<reasoning>", "final_answer": "<answer>"}"#,
    };

    format!(
        r#"You are the Kaggle Experiment Assistant, an agent that helps a data scientist explore
competition data and run experiments inside a Kaggle notebook environment.

## Tools

{tools}

## Guidelines

1. Start by listing the input files before loading anything.
2. Inspect data with load_data (use nrows for large files) and summarize_data before modelling.
3. Keep execute_code snippets short and print what you need to see. Each call starts a fresh interpreter
   with pandas as pd, numpy as np, os and json already imported.
4. After every experiment, call log_experiment with the model, parameters and validation score.
5. Save reusable scripts and notes with save_text.
6. If a tool returns an error, read it and adjust instead of repeating the same call.

{response_format}"#
    )
}

/// Prompt from `override_path` when it is readable, otherwise the generated one.
pub fn load_system_prompt(
    registry: &ToolRegistry,
    format: ResponseFormat,
    override_path: Option<&Path>,
) -> String {
    if let Some(path) = override_path {
        match std::fs::read_to_string(path) {
            Ok(text) if !text.trim().is_empty() => {
                debug!(path = %path.display(), "Loaded system instructions");
                return text;
            }
            Ok(_) => warn!(path = %path.display(), "System instructions file is empty, using built-in prompt"),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "System instructions not found, using built-in prompt")
            }
        }
    }
    build_system_prompt(registry, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        ToolRegistry::with_builtin_tools().unwrap()
    }

    #[test]
    fn test_lists_every_tool_signature() {
        let prompt = build_system_prompt(&registry(), ResponseFormat::LinePrefixed);
        for sig in ["list_files(directory)", "load_data(filepath, nrows?)", "save_text(filename, content)"] {
            assert!(prompt.contains(sig), "missing {sig}");
        }
        assert!(prompt.contains("Final Answer:"));
        assert!(!prompt.contains("tool_args"));
    }

    #[test]
    fn test_json_format() {
        let prompt = build_system_prompt(&registry(), ResponseFormat::Json);
        assert!(prompt.contains(r#""tool_args""#));
        assert!(prompt.contains(r#""final_answer""#));
    }

    #[test]
    fn test_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_instructions.md");
        std::fs::write(&path, "Custom instructions").unwrap();
        assert_eq!(load_system_prompt(&registry(), ResponseFormat::LinePrefixed, Some(&path)), "Custom instructions");
    }

    #[test]
    fn test_missing_override_falls_back() {
        let missing = Path::new("/no/such/system_instructions.md");
        let prompt = load_system_prompt(&registry(), ResponseFormat::LinePrefixed, Some(missing));
        assert_eq!(prompt, build_system_prompt(&registry(), ResponseFormat::LinePrefixed));
    }
}
