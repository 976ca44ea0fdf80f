use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, BufRead, Write};

use keaa_agent::{truncate_for_display, AgentAction, StepRecord, WorkflowOutcome, WorkflowReport};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const AGENT_TEXT: Color = Color::Cyan;
    const TOOL_CALL: Color = Color::Yellow;
    const TOOL_RESULT: Color = Color::DarkGreen;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
    const WARNING: Color = Color::Red;
}

/// Step-by-step console output for a workflow run.
#[derive(Debug, Clone, Copy)]
pub struct Terminal {
    /// Tool output beyond this many characters is cut in the display.
    display_truncate: usize,
}

/// Plain-text lines shown for one step: header, reply, and tool call/output.
pub fn step_lines(record: &StepRecord, display_truncate: usize) -> Vec<String> {
    let mut lines = vec![format!("\n[Step {}]", record.step), format!("Agent: {}", record.response)];
    if let AgentAction::ToolCall { name, raw_args } = &record.action {
        lines.push(format!("Tool Call: {name}({raw_args})"));
    }
    if let Some(observation) = &record.observation {
        lines.push(format!("Tool Output: {}", truncate_for_display(observation, display_truncate)));
    }
    lines
}

impl Terminal {
    pub fn new(display_truncate: usize) -> Self {
        Self { display_truncate }
    }

    fn print_colored(&self, color: Color, text: &str) -> io::Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, SetForegroundColor(color), Print(text), Print("\n"), ResetColor)?;
        stdout.flush()
    }

    /// Print the startup banner.
    pub fn print_banner(&self, offline: bool, model: &str, goal: &str) -> io::Result<()> {
        self.print_colored(Colors::HEADER, "Initializing Kaggle Experiment Assistant Agent...")?;
        let mode = if offline {
            "Mode: OFFLINE (Mock responses)".to_string()
        } else {
            format!("Mode: ONLINE ({model})")
        };
        self.print_colored(Colors::DIM, &mode)?;
        self.print_colored(Colors::HEADER, &format!("--- Starting Agent Session ---\nGoal: {goal}"))
    }

    pub fn print_step(&self, record: &StepRecord) -> io::Result<()> {
        let lines = step_lines(record, self.display_truncate);
        for (i, line) in lines.iter().enumerate() {
            let color = match i {
                0 => Colors::HEADER,
                1 => Colors::AGENT_TEXT,
                _ if line.starts_with("Tool Call:") => Colors::TOOL_CALL,
                _ => Colors::TOOL_RESULT,
            };
            self.print_colored(color, line)?;
        }
        Ok(())
    }

    pub fn print_outcome(&self, report: &WorkflowReport) -> io::Result<()> {
        match &report.outcome {
            WorkflowOutcome::Done(answer) => {
                self.print_colored(Colors::HEADER, &format!("\n--- Task Completed ---\nFinal Answer: {answer}"))
            }
            WorkflowOutcome::StepExhausted => self.print_colored(Colors::WARNING, "\n--- Max Steps Reached ---"),
        }
    }

    /// Ask for the goal on stdin. Returns the line without its newline.
    pub fn read_goal(&self) -> io::Result<String> {
        let mut stdout = io::stdout();
        execute!(stdout, Print("--- Interactive Mode ---\nEnter your goal: "))?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_step_lines_truncate_output() {
        let record = StepRecord {
            step: 2,
            response: "Action: list_files('/in')".into(),
            action: AgentAction::ToolCall { name: "list_files".into(), raw_args: "'/in'".into() },
            observation: Some("y".repeat(20)),
        };
        assert_eq!(
            step_lines(&record, 5),
            vec![
                "\n[Step 2]".to_string(),
                "Agent: Action: list_files('/in')".to_string(),
                "Tool Call: list_files('/in')".to_string(),
                "Tool Output: yyyyy...".to_string(),
            ]
        );
    }

    #[test]
    fn test_text_step_lines() {
        let record = StepRecord {
            step: 1,
            response: "hmm".into(),
            action: AgentAction::PlainText { text: "hmm".into() },
            observation: None,
        };
        assert_eq!(step_lines(&record, 500).len(), 2);
    }
}
