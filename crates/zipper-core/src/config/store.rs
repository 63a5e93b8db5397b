//! Job status store configuration.

use serde::{Deserialize, Serialize};

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis connection URL (used by the `"redis"` provider).
    #[serde(default = "default_url")]
    pub url: String,
    /// Key prefix for all job record keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// How long job records remain readable, in seconds.
    #[serde(default = "default_result_ttl")]
    pub result_ttl_seconds: u64,
    /// Maximum number of finished job records held by the in-memory store.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: default_url(),
            key_prefix: default_key_prefix(),
            result_ttl_seconds: default_result_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_url() -> String {
    "redis://localhost:6379/1".to_string()
}

fn default_key_prefix() -> String {
    "zipper:".to_string()
}

fn default_result_ttl() -> u64 {
    86_400
}

fn default_max_capacity() -> u64 {
    100_000
}
