//! CLI command definitions and dispatch.

pub mod run;
pub mod status;
pub mod submit;
pub mod worker;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use zipper_broker::{Broker, JobStore};
use zipper_core::config::AppConfig;
use zipper_core::error::AppError;

/// Zipper: archive every subfolder of a directory through a worker pool
#[derive(Debug, Parser)]
#[command(name = "zipper", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding `default` and per-environment config files
    #[arg(short, long, default_value = "config")]
    pub config_dir: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a worker pool against the configured broker
    Worker(worker::WorkerArgs),
    /// Queue one archive job per subfolder
    Submit(submit::SubmitArgs),
    /// Show the status of a job
    Status(status::StatusArgs),
    /// Submit a batch and process it with an embedded worker pool
    Run(run::RunArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Worker(args) => worker::execute(args, config).await,
            Commands::Submit(args) => submit::execute(args, config).await,
            Commands::Status(args) => status::execute(args, config).await,
            Commands::Run(args) => run::execute(args, config).await,
        }
    }
}

/// Helper: connect the configured broker and job store
pub async fn connect_backends(
    config: &AppConfig,
) -> Result<(Arc<dyn Broker>, Arc<dyn JobStore>), AppError> {
    let broker = zipper_broker::connect_broker(&config.broker).await?;
    let store = zipper_broker::connect_store(&config.store).await?;
    Ok((broker, store))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
