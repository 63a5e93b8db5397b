//! Long-running worker command.

use clap::Args;
use tokio::sync::watch;

use zipper_archive::ArchiveExecutor;
use zipper_core::config::AppConfig;
use zipper_core::error::AppError;
use zipper_worker::WorkerPool;

/// Arguments for the worker command
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Number of concurrent slots (overrides `worker.concurrency`)
    #[arg(short = 'n', long)]
    pub concurrency: Option<usize>,

    /// Stable worker identifier (overrides `worker.worker_id`)
    #[arg(long)]
    pub worker_id: Option<String>,
}

/// Run a worker pool until Ctrl+C or SIGTERM
pub async fn execute(args: &WorkerArgs, mut config: AppConfig) -> Result<(), AppError> {
    if let Some(concurrency) = args.concurrency {
        config.worker.concurrency = concurrency;
    }
    if let Some(worker_id) = &args.worker_id {
        config.worker.worker_id = Some(worker_id.clone());
    }

    config.validate_worker()?;

    let (broker, store) = super::connect_backends(&config).await?;
    let pool = WorkerPool::new(
        broker,
        store,
        ArchiveExecutor::new(&config.archive),
        config.worker.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        super::shutdown_signal().await;
        tracing::info!("Shutdown signal received, starting graceful shutdown...");
        let _ = shutdown_tx.send(true);
    });

    pool.run(shutdown_rx).await;
    Ok(())
}
