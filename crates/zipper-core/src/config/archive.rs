//! Archive output configuration.

use serde::{Deserialize, Serialize};

/// Archive output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// File extension of produced archives, without the leading dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Deflate level. `None` uses the codec default.
    #[serde(default)]
    pub compression_level: Option<i64>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            compression_level: None,
        }
    }
}

fn default_extension() -> String {
    "zip".to_string()
}
