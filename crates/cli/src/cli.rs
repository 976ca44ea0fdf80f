use std::path::PathBuf;

use clap::Parser;
use keaa_agent::WorkflowOutcome;
use keaa_core::Config;

pub const EXAMPLE_USAGE: &str = "Example usage:\n  keaa --goal 'Analyze the housing prices dataset' --offline";

/// Kaggle Experiment Assistant Agent (KEAA).
///
/// Drives a model through reason/act/observe steps over the competition
/// data until it gives a final answer or runs out of steps.
#[derive(Parser, Debug)]
#[command(name = "keaa", version, about = "Kaggle Experiment Assistant Agent (KEAA)")]
pub struct CliArgs {
    /// The goal for the agent (e.g. 'Build a baseline for Titanic')
    #[arg(long)]
    pub goal: Option<String>,

    /// Path to the dataset to focus on
    #[arg(long)]
    pub data: Option<String>,

    /// Run with mock responses instead of calling Gemini
    #[arg(long)]
    pub offline: bool,

    /// Prompt for the goal on stdin
    #[arg(long)]
    pub interactive: bool,

    /// Maximum number of model calls
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Gemini model name override
    #[arg(long)]
    pub model: Option<String>,

    /// Re-prompt on malformed Action lines instead of ignoring them
    #[arg(long)]
    pub strict: bool,

    /// Print the workflow report as JSON instead of step-by-step output
    #[arg(long)]
    pub json: bool,

    /// TOML config file (environment variables still override it)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CliArgs {
    /// Flags win over file and environment settings.
    pub fn apply_to(&self, config: &mut Config) {
        if self.offline {
            config.workspace.offline = true;
        }
        if let Some(steps) = self.max_steps {
            config.agent.max_steps = steps;
        }
        if let Some(model) = &self.model {
            config.gemini.model_name = model.clone();
        }
        if self.strict {
            config.agent.strict_actions = true;
        }
    }
}

/// Goal text sent to the agent, with the dataset hint appended.
pub fn focus_goal(goal: &str, data: Option<&str>) -> String {
    match data {
        Some(path) => format!("{goal} (Focus on data at: {path})"),
        None => goal.to_string(),
    }
}

/// 0 when the agent answered, 2 when it ran out of steps.
pub fn exit_code(outcome: &WorkflowOutcome) -> u8 {
    match outcome {
        WorkflowOutcome::Done(_) => 0,
        WorkflowOutcome::StepExhausted => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = CliArgs::try_parse_from([
            "keaa", "--goal", "Titanic baseline", "--data", "/kaggle/input/titanic", "--offline", "--max-steps", "4",
            "--strict", "--json",
        ])
        .unwrap();
        assert_eq!(args.goal.as_deref(), Some("Titanic baseline"));
        assert_eq!(args.max_steps, Some(4));
        assert!(args.offline && args.strict && args.json && !args.interactive);
    }

    #[test]
    fn test_apply_to_overrides_config() {
        let args = CliArgs::try_parse_from(["keaa", "--offline", "--max-steps", "3", "--model", "gemini-2.5-flash"]).unwrap();
        let mut config = Config::default();
        args.apply_to(&mut config);
        assert!(config.workspace.offline);
        assert_eq!(config.agent.max_steps, 3);
        assert_eq!(config.gemini.model_name, "gemini-2.5-flash");
        assert!(!config.agent.strict_actions);
    }

    #[test]
    fn test_no_flags_keeps_config() {
        let args = CliArgs::try_parse_from(["keaa"]).unwrap();
        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config.agent.max_steps, Config::default().agent.max_steps);
        assert!(args.goal.is_none() && !args.interactive);
    }

    #[test]
    fn test_focus_goal() {
        assert_eq!(focus_goal("Explore", None), "Explore");
        assert_eq!(focus_goal("Explore", Some("/data/train.csv")), "Explore (Focus on data at: /data/train.csv)");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&WorkflowOutcome::Done("ok".into())), 0);
        assert_eq!(exit_code(&WorkflowOutcome::StepExhausted), 2);
    }
}
