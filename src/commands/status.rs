//! Job status command.

use clap::Args;

use zipper_core::config::AppConfig;
use zipper_core::error::AppError;
use zipper_core::types::JobId;
use zipper_worker::Submitter;

use crate::output;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Job identifiers returned by `submit`
    #[arg(required = true)]
    pub job_ids: Vec<JobId>,
}

/// Print the current record of each job
pub async fn execute(args: &StatusArgs, config: AppConfig) -> Result<(), AppError> {
    let (broker, store) = super::connect_backends(&config).await?;
    let submitter = Submitter::new(store, broker);

    for job_id in &args.job_ids {
        let job = submitter.status(*job_id).await?;
        output::print_line(&job)?;
    }

    Ok(())
}
