mod cli;
mod terminal;

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use tracing::{debug, error};

use keaa_agent::AgentLoop;
use keaa_core::Config;

use crate::cli::CliArgs;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(CliArgs::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Startup failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: CliArgs) -> Result<ExitCode> {
    keaa_core::config::load_dotenv();
    let mut config = Config::load(args.config.as_deref()).context("failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let terminal = Terminal::new(config.agent.display_truncate);

    let goal = if args.interactive {
        terminal.read_goal().context("failed to read goal from stdin")?
    } else if let Some(goal) = &args.goal {
        goal.clone()
    } else {
        CliArgs::command().print_help()?;
        println!("\n\n{}", cli::EXAMPLE_USAGE);
        return Ok(ExitCode::SUCCESS);
    };
    if goal.trim().is_empty() {
        bail!("goal must not be empty");
    }
    let goal = cli::focus_goal(&goal, args.data.as_deref());

    let provider = keaa_llm::create_provider(&config);
    let mut agent = AgentLoop::from_config(&config, provider).context("failed to set up agent")?;

    if !args.json {
        terminal.print_banner(config.is_offline(), &config.gemini.model_name, &goal)?;
        agent = agent.with_observer(move |record| {
            if let Err(e) = terminal.print_step(record) {
                debug!(error = %e, "Failed to print step");
            }
        });
    }

    let report = agent.run_workflow(&goal).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        terminal.print_outcome(&report)?;
    }

    Ok(ExitCode::from(cli::exit_code(&report.outcome)))
}
