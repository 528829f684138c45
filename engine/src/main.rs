// Panel interview engine
// Main entry point for the panel binary

use clap::Parser;
use panel_engine::cli::{Cli, Command};
use panel_engine::config::Config;
use panel_engine::handlers::{
    handle_agents, handle_ask, handle_doctor, handle_interview, OutputFormat,
};
use panel_engine::telemetry::init_telemetry_with_level;
use sdk::{EngineError, PanelErrorExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = run(cli).await;
    if let Err(e) = &result {
        if let Some(engine_error) = e.downcast_ref::<EngineError>() {
            eprintln!("hint: {}", engine_error.user_hint());
        }
    }
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_or_create_at(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Panel Engine v{} ({} - {})", version, commit, timestamp);

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Interview {
            scripted,
            no_intro,
            mute,
        } => {
            tracing::info!("Starting interview with {} interviewers", config.agents.len());
            handle_interview(&config, format, scripted, no_intro, mute).await
        }

        Command::Ask { text, scripted } => {
            tracing::info!("Submitting single answer");
            handle_ask(text, &config, format, scripted).await
        }

        Command::Agents => handle_agents(&config, format).await,

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
