//! Zipper: batch directory archiving service
//!
//! Entry point that loads configuration, initializes logging, and dispatches
//! to the worker, submission, and status commands.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use zipper_core::config::AppConfig;
use zipper_core::config::logging::LoggingConfig;
use zipper_core::error::AppError;

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(e) = cli.execute(config).await {
        tracing::error!("Command failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment
fn load_configuration(cli: &Cli) -> Result<AppConfig, AppError> {
    let env = std::env::var("ZIPPER_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load_from(&cli.config_dir, &env)
}

/// Initialize tracing/logging. Logs go to stderr so stdout stays JSON lines.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
