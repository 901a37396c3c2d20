//! Version keys: surrogate keys and identity keys share one type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::{Uuid, Version};

use crate::errors::{VestigeError, VestigeResult};

/// A random (version 4) UUID used both as a row's surrogate key and as the
/// identity key grouping all versions of one logical object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionKey(Uuid);

impl VersionKey {
    /// Generate a fresh key.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Accept only version 4 UUIDs.
    pub fn from_uuid(uuid: Uuid) -> VestigeResult<Self> {
        if uuid.get_version() != Some(Version::Random) {
            return Err(VestigeError::InvalidArgument(format!(
                "{uuid} is not a version 4 UUID"
            )));
        }
        Ok(Self(uuid))
    }

    /// Parse the hyphenated (or simple) textual form.
    pub fn parse(input: &str) -> VestigeResult<Self> {
        let uuid = Uuid::parse_str(input).map_err(|e| {
            VestigeError::InvalidArgument(format!("`{input}` is not a valid identifier: {e}"))
        })?;
        Self::from_uuid(uuid)
    }

    /// Decode the 16-byte binary form.
    pub fn from_slice(bytes: &[u8]) -> VestigeResult<Self> {
        let uuid = Uuid::from_slice(bytes).map_err(|e| {
            VestigeError::InvalidArgument(format!("invalid identifier bytes: {e}"))
        })?;
        Self::from_uuid(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for VersionKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for VersionKey {
    type Err = VestigeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
