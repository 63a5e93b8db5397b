//! Batch submission command.

use std::path::PathBuf;

use clap::Args;

use zipper_core::config::AppConfig;
use zipper_core::error::AppError;
use zipper_worker::Submitter;

use crate::output;

/// Arguments for the submit command
#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Parent directory whose subfolders are archived
    pub folder: PathBuf,

    /// Directory receiving the archives
    #[arg(short, long, default_value = "zipped_output")]
    pub output_dir: PathBuf,
}

/// Queue the batch and print one `{name, job_id}` line per job
pub async fn execute(args: &SubmitArgs, config: AppConfig) -> Result<(), AppError> {
    if config.broker.provider == "memory" {
        tracing::warn!(
            "Broker provider is 'memory'; jobs submitted here are only visible to this process"
        );
    }

    let (broker, store) = super::connect_backends(&config).await?;
    let submitter = Submitter::new(store, broker);
    match submitter.submit_batch(&args.folder, &args.output_dir).await {
        Ok(submitted) => output::print_lines(&submitted),
        Err(e) => {
            output::print_lines(e.submitted())?;
            Err(e.into())
        }
    }
}
