//! Model reply classification.
//!
//! A reply is read first as a structured JSON object (optionally wrapped in a
//! Markdown code fence), then as `Thought:` / `Action:` / `Final Answer:`
//! prefixed lines. Parsing never fails: anything unrecognised is
//! [`AgentAction::PlainText`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

const FINAL_ANSWER: &str = "Final Answer:";
const ACTION: &str = "Action:";
const THOUGHT: &str = "Thought:";

/// What the model asked the loop to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    /// Invoke `name` with `raw_args`, the argument list text between the parentheses.
    ToolCall { name: String, raw_args: String },
    FinalAnswer { text: String },
    PlainText { text: String },
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentAction::ToolCall { name, raw_args } => write!(f, "{name}({raw_args})"),
            AgentAction::FinalAnswer { text } => write!(f, "Final Answer: {text}"),
            AgentAction::PlainText { .. } => write!(f, "(text)"),
        }
    }
}

/// How to treat an `Action:` line that is not of the form `name(args)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStrictness {
    /// Ignore the line, as if it were prose.
    #[default]
    Lenient,
    /// Report it so the caller can ask the model to fix it.
    Strict,
}

/// Full parse result: the action plus what was noticed on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub action: AgentAction,
    /// `Thought:` lines joined with spaces (or the JSON `thought` field).
    pub thought: Option<String>,
    /// Malformed `Action:` line, only reported in strict mode.
    pub malformed_action: Option<String>,
}

/// Lenient parse of a model reply.
pub fn parse(response: &str) -> AgentAction {
    parse_with(response, ParseStrictness::Lenient).action
}

pub fn parse_with(response: &str, strictness: ParseStrictness) -> Parsed {
    parse_json(response).unwrap_or_else(|| parse_lines(response, strictness))
}

/// Drop a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // The info string ("json") runs up to the first newline.
    match body.find('\n') {
        Some(idx) => body[idx + 1..].trim(),
        None => body.trim(),
    }
}

/// Render one argument as a literal token the dispatcher can decode again.
fn render_args(args: Option<&Value>) -> String {
    match args {
        None | Some(Value::Null) => String::new(),
        Some(Value::Array(items)) => items.iter().map(Value::to_string).collect::<Vec<_>>().join(", "),
        Some(scalar) => scalar.to_string(),
    }
}

fn parse_json(response: &str) -> Option<Parsed> {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(strip_code_fence(response)) else {
        return None;
    };

    let thought = match obj.get("thought") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };

    let action = match (obj.get("tool_name"), obj.get("final_answer")) {
        (Some(Value::String(name)), _) if !name.is_empty() => AgentAction::ToolCall {
            name: name.clone(),
            raw_args: render_args(obj.get("tool_args")),
        },
        (_, Some(Value::String(text))) => AgentAction::FinalAnswer { text: text.clone() },
        (_, Some(other)) => AgentAction::FinalAnswer { text: other.to_string() },
        _ => AgentAction::PlainText { text: Value::Object(obj.clone()).to_string() },
    };

    Some(Parsed { action, thought, malformed_action: None })
}

fn parse_lines(response: &str, strictness: ParseStrictness) -> Parsed {
    let mut thoughts: Vec<&str> = Vec::new();
    let mut tool_call: Option<AgentAction> = None;
    let mut malformed: Option<String> = None;

    let joined = |thoughts: &[&str]| (!thoughts.is_empty()).then(|| thoughts.join(" "));

    for line in response.lines() {
        let line = line.trim_start();

        if let Some(rest) = line.strip_prefix(FINAL_ANSWER) {
            return Parsed {
                action: AgentAction::FinalAnswer { text: rest.trim().to_string() },
                thought: joined(&thoughts),
                malformed_action: None,
            };
        }

        if let Some(rest) = line.strip_prefix(ACTION) {
            let content = rest.trim();
            match content.find('(') {
                Some(open) if content.ends_with(')') => {
                    tool_call = Some(AgentAction::ToolCall {
                        name: content[..open].trim().to_string(),
                        raw_args: content[open + 1..content.len() - 1].to_string(),
                    });
                }
                _ => malformed = Some(line.trim_end().to_string()),
            }
        } else if let Some(rest) = line.strip_prefix(THOUGHT) {
            let thought = rest.trim();
            if !thought.is_empty() {
                thoughts.push(thought);
            }
        }
    }

    let plain = || AgentAction::PlainText { text: response.to_string() };
    let (action, malformed_action) = match (strictness, malformed) {
        (ParseStrictness::Strict, Some(line)) => (plain(), Some(line)),
        _ => (tool_call.unwrap_or_else(plain), None),
    };

    Parsed { action, thought: joined(&thoughts), malformed_action }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(name: &str, raw_args: &str) -> AgentAction {
        AgentAction::ToolCall { name: name.into(), raw_args: raw_args.into() }
    }

    #[test]
    fn test_json_tool_call_renders_args() {
        let action = parse(r#"{"thought":"x","tool_name":"load_data","tool_args":["/data/a.csv", 10]}"#);
        assert_eq!(action, tool("load_data", r#""/data/a.csv", 10"#));
    }

    #[test]
    fn test_json_scalar_and_missing_args() {
        assert_eq!(parse(r#"{"tool_name":"list_files","tool_args":"/in"}"#), tool("list_files", r#""/in""#));
        assert_eq!(parse(r#"{"tool_name":"list_files"}"#), tool("list_files", ""));
        assert_eq!(parse(r#"{"tool_name":"list_files","tool_args":null}"#), tool("list_files", ""));
    }

    #[test]
    fn test_json_final_answer() {
        let parsed = parse_with(r#"{"thought":"done thinking","final_answer":"CV 0.81"}"#, ParseStrictness::Lenient);
        assert_eq!(parsed.action, AgentAction::FinalAnswer { text: "CV 0.81".into() });
        assert_eq!(parsed.thought.as_deref(), Some("done thinking"));

        assert_eq!(parse(r#"{"final_answer": {"score": 1}}"#), AgentAction::FinalAnswer { text: r#"{"score":1}"#.into() });
    }

    #[test]
    fn test_json_without_known_keys_is_plain_text() {
        assert_eq!(parse(r#"{"note": "hi"}"#), AgentAction::PlainText { text: r#"{"note":"hi"}"#.into() });
    }

    #[test]
    fn test_json_empty_tool_name_falls_to_final_answer() {
        assert_eq!(
            parse(r#"{"tool_name":"","final_answer":"ok"}"#),
            AgentAction::FinalAnswer { text: "ok".into() }
        );
    }

    #[test]
    fn test_fenced_json() {
        let reply = "```json\n{\"tool_name\": \"summarize_data\", \"tool_args\": [\"train.csv\"]}\n```";
        assert_eq!(parse(reply), tool("summarize_data", r#""train.csv""#));
    }

    #[test]
    fn test_non_object_json_uses_line_strategy() {
        assert_eq!(parse("42"), AgentAction::PlainText { text: "42".into() });
        assert_eq!(parse(r#"["Final Answer: no"]"#), AgentAction::PlainText { text: r#"["Final Answer: no"]"#.into() });
    }

    #[test]
    fn test_final_answer_after_thoughts() {
        let parsed = parse_with("Thought: a\nThought: b\nFinal Answer:  42 ", ParseStrictness::Lenient);
        assert_eq!(parsed.action, AgentAction::FinalAnswer { text: "42".into() });
        assert_eq!(parsed.thought.as_deref(), Some("a b"));
    }

    #[test]
    fn test_action_line() {
        let reply = "Thought: I should check the files.\nAction: list_files(\"/kaggle/input\")";
        assert_eq!(parse(reply), tool("list_files", "\"/kaggle/input\""));
    }

    #[test]
    fn test_leading_whitespace_ignored() {
        assert_eq!(parse("   Action:  save_text('a.txt', 'x')  "), tool("save_text", "'a.txt', 'x'"));
        assert_eq!(parse("\tFinal Answer: yes"), AgentAction::FinalAnswer { text: "yes".into() });
    }

    #[test]
    fn test_later_action_replaces_earlier() {
        let reply = "Action: list_files('/a')\nAction: load_data('/a/b.csv')";
        assert_eq!(parse(reply), tool("load_data", "'/a/b.csv'"));
    }

    #[test]
    fn test_final_answer_wins_over_action() {
        let reply = "Action: list_files('/a')\nFinal Answer: stop here";
        assert_eq!(parse(reply), AgentAction::FinalAnswer { text: "stop here".into() });
    }

    #[test]
    fn test_no_markers_is_verbatim_plain_text() {
        let reply = "I think we should look at the data first.\nThen train.";
        assert_eq!(parse(reply), AgentAction::PlainText { text: reply.into() });
    }

    #[test]
    fn test_malformed_action_lenient_vs_strict() {
        let reply = "Thought: go\nAction: list_files('/kaggle/input'";
        assert_eq!(parse(reply), AgentAction::PlainText { text: reply.into() });

        let strict = parse_with(reply, ParseStrictness::Strict);
        assert_eq!(strict.action, AgentAction::PlainText { text: reply.into() });
        assert_eq!(strict.malformed_action.as_deref(), Some("Action: list_files('/kaggle/input'"));
    }

    #[test]
    fn test_strict_reports_malformed_even_with_valid_action() {
        let reply = "Action: list_files('/a')\nAction: load_data";
        assert_eq!(parse(reply), tool("list_files", "'/a'"));
        assert!(parse_with(reply, ParseStrictness::Strict).malformed_action.is_some());
    }

    #[test]
    fn test_gateway_error_text_is_plain() {
        assert_eq!(
            parse("Error: backend call timed out after 120s"),
            AgentAction::PlainText { text: "Error: backend call timed out after 120s".into() }
        );
    }

    #[test]
    fn test_crlf_and_empty() {
        assert_eq!(parse("Thought: x\r\nFinal Answer: y\r\n"), AgentAction::FinalAnswer { text: "y".into() });
        assert_eq!(parse(""), AgentAction::PlainText { text: String::new() });
    }
}
