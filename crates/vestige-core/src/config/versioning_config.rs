//! Versioning engine configuration.

use serde::{Deserialize, Serialize};

/// How version keys are laid out in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierMode {
    /// 16-byte blobs.
    Uuid,
    /// 36-character hyphenated strings.
    #[default]
    Text,
}

/// Configuration for the versioning engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    pub identifier_mode: IdentifierMode,
    /// Key of the collector-hook implementation used by soft deletes.
    pub collector: String,
    /// Max rows per multi-row insert when carrying relations forward on clone.
    pub relation_batch_size: usize,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            identifier_mode: IdentifierMode::Text,
            collector: "default".to_string(),
            relation_batch_size: 500,
        }
    }
}
