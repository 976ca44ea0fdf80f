pub mod agent_loop;
pub mod parser;
pub mod prompt;

pub use agent_loop::{
    truncate_for_display, AgentError, AgentLoop, StepRecord, WorkflowOutcome, WorkflowReport, CONTINUE_PROMPT,
};
pub use parser::{parse, parse_with, strip_code_fence, AgentAction, ParseStrictness, Parsed};
pub use prompt::{build_system_prompt, load_system_prompt, ResponseFormat};
