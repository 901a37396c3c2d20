pub mod storage_config;
pub mod versioning_config;

use serde::{Deserialize, Serialize};

pub use storage_config::StorageConfig;
pub use versioning_config::{IdentifierMode, VersioningConfig};

/// Top-level configuration aggregating all subsystem configs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VestigeConfig {
    pub storage: StorageConfig,
    pub versioning: VersioningConfig,
}

impl VestigeConfig {
    /// Load config from a TOML string, falling back to defaults for missing fields.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
