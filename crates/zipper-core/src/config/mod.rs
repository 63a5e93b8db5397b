//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! optional TOML files plus `ZIPPER__`-prefixed environment variables.
//! Every field carries a default, so an empty environment yields a working
//! in-process setup.

pub mod archive;
pub mod broker;
pub mod logging;
pub mod store;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::archive::ArchiveConfig;
use self::broker::BrokerConfig;
use self::logging::LoggingConfig;
use self::store::StoreConfig;
use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Job queue backend settings.
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Job status store backend settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Worker pool settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Archive output settings.
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files in `dir`.
    ///
    /// Merges `{dir}/default` with an environment-specific overlay and
    /// environment variables prefixed with `ZIPPER_`, e.g.
    /// `ZIPPER__BROKER__URL=redis://broker:6379/0`.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ZIPPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Check the settings a worker pool needs before it starts.
    ///
    /// In-flight lists outlive the process on a shared broker, so a worker
    /// must run under the same `worker_id` after a restart to reclaim them.
    pub fn validate_worker(&self) -> Result<(), AppError> {
        let has_stable_id = self
            .worker
            .worker_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());

        if self.broker.provider == "redis" && !has_stable_id {
            return Err(AppError::configuration(
                "worker.worker_id must be set when broker.provider is 'redis'",
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(AppError::configuration("worker.concurrency must be at least 1"));
        }
        Ok(())
    }
}
