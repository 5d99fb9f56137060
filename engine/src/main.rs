// Exa scheduling assistant
// Main entry point for the exa binary

use clap::Parser;
use std::process::ExitCode;
use exa_engine::cli::{Cli, Command};
use exa_engine::config::Config;
use exa_engine::handlers::{handle_chat, handle_doctor, handle_run, handle_serve, OutputFormat};
use exa_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log beats the config file; RUST_LOG beats both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!(
        "Exa v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match cli.command {
        Command::Chat => handle_chat(&config, format).await?,

        Command::Run { query } => {
            tracing::info!("Executing request: {}", query);
            return handle_run(query, &config, format).await;
        }

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await?
        }

        Command::Serve { bind } => {
            tracing::info!("Starting API server on {}", bind);
            handle_serve(&bind, &config).await?
        }
    }

    Ok(ExitCode::SUCCESS)
}
