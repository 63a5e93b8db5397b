//! One-shot command: submit a batch, process it in-process, report results.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tokio::sync::watch;

use zipper_archive::ArchiveExecutor;
use zipper_core::config::AppConfig;
use zipper_core::error::AppError;
use zipper_core::types::JobId;
use zipper_entity::JobState;
use zipper_worker::{Submitter, WorkerPool};

use crate::output;

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Parent directory whose subfolders are archived
    pub folder: PathBuf,

    /// Directory receiving the archives
    #[arg(short, long, default_value = "zipped_output")]
    pub output_dir: PathBuf,

    /// Status polling interval in milliseconds
    #[arg(long, default_value_t = 500)]
    pub poll_ms: u64,
}

/// Final line printed once every job is terminal.
#[derive(Debug, Default, Serialize)]
struct BatchSummary {
    total: usize,
    succeeded: usize,
    failed: usize,
    empty: usize,
}

/// Submit, wait for every job, and print each final record
pub async fn execute(args: &RunArgs, config: AppConfig) -> Result<(), AppError> {
    config.validate_worker()?;

    let (broker, store) = super::connect_backends(&config).await?;
    let submitter = Submitter::new(store.clone(), broker.clone());

    let pool = WorkerPool::new(
        broker,
        store,
        ArchiveExecutor::new(&config.archive),
        config.worker.clone(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool_handle = tokio::spawn(async move { pool.run(shutdown_rx).await });

    let outcome = tokio::select! {
        outcome = submit_and_wait(&submitter, args) => outcome,
        _ = super::shutdown_signal() => {
            tracing::info!("Shutdown signal received, abandoning batch");
            Ok(())
        }
    };

    let _ = shutdown_tx.send(true);
    pool_handle
        .await
        .map_err(|e| AppError::internal(format!("Worker pool task failed: {e}")))?;

    outcome
}

async fn submit_and_wait(submitter: &Submitter, args: &RunArgs) -> Result<(), AppError> {
    let submitted = match submitter.submit_batch(&args.folder, &args.output_dir).await {
        Ok(submitted) => submitted,
        Err(e) => {
            output::print_lines(e.submitted())?;
            return Err(e.into());
        }
    };
    output::print_lines(&submitted)?;

    let mut remaining: Vec<JobId> = submitted.iter().map(|j| j.job_id).collect();
    let mut summary = BatchSummary {
        total: remaining.len(),
        ..BatchSummary::default()
    };
    let mut interval = tokio::time::interval(Duration::from_millis(args.poll_ms.max(10)));

    while !remaining.is_empty() {
        interval.tick().await;

        let mut finished = HashSet::new();
        for job_id in &remaining {
            let job = submitter.status(*job_id).await?;
            match job.state {
                JobState::Succeeded => summary.succeeded += 1,
                JobState::Failed => summary.failed += 1,
                JobState::Empty => summary.empty += 1,
                JobState::Pending | JobState::Running => continue,
            }
            output::print_line(&job)?;
            finished.insert(*job_id);
        }
        remaining.retain(|id| !finished.contains(id));
    }

    output::print_line(&summary)
}
