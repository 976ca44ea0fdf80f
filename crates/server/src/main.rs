mod api;
mod router;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// HTTP front end for the Kaggle experiment assistant.
#[derive(Parser, Debug)]
#[command(name = "keaa-server", version, about)]
struct Args {
    /// TOML config file (environment variables still override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Answer chat requests without calling the model
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let args = Args::parse();

    keaa_core::config::load_dotenv();
    let mut config = keaa_core::Config::load(args.config.as_deref()).context("failed to load configuration")?;
    if args.offline {
        config.workspace.offline = true;
    }
    config.log_summary();

    let provider = keaa_llm::create_provider_with(&config, true);
    let state = Arc::new(state::AppState::new(config, provider).context("failed to build tool registry")?);
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
