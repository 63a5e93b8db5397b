//! Backend selection from configuration.

use std::sync::Arc;

use tracing::info;

use zipper_core::config::broker::BrokerConfig;
use zipper_core::config::store::StoreConfig;
use zipper_core::error::AppError;
use zipper_core::result::AppResult;

use crate::traits::{Broker, JobStore};

/// Build the broker selected by `config.provider`.
pub async fn connect_broker(config: &BrokerConfig) -> AppResult<Arc<dyn Broker>> {
    let broker: Arc<dyn Broker> = match config.provider.as_str() {
        #[cfg(feature = "redis-backend")]
        "redis" => {
            info!("Initializing Redis broker");
            let client = crate::redis::RedisClient::connect(&config.url, &config.key_prefix).await?;
            Arc::new(crate::redis::RedisBroker::new(client, config.poll_interval_ms))
        }
        #[cfg(feature = "memory")]
        "memory" => {
            info!("Initializing in-memory broker");
            Arc::new(crate::memory::MemoryBroker::new())
        }
        other => {
            return Err(AppError::configuration(format!(
                "Unknown broker provider: '{other}'. Supported: memory, redis"
            )));
        }
    };

    Ok(broker)
}

/// Build the job store selected by `config.provider`.
pub async fn connect_store(config: &StoreConfig) -> AppResult<Arc<dyn JobStore>> {
    let store: Arc<dyn JobStore> = match config.provider.as_str() {
        #[cfg(feature = "redis-backend")]
        "redis" => {
            info!("Initializing Redis job store");
            let client = crate::redis::RedisClient::connect(&config.url, &config.key_prefix).await?;
            Arc::new(crate::redis::RedisJobStore::new(client, config.result_ttl_seconds))
        }
        #[cfg(feature = "memory")]
        "memory" => {
            info!("Initializing in-memory job store");
            Arc::new(crate::memory::MemoryJobStore::new(config))
        }
        other => {
            return Err(AppError::configuration(format!(
                "Unknown job store provider: '{other}'. Supported: memory, redis"
            )));
        }
    };

    Ok(store)
}
