//! Config fingerprinting: deterministic identification of a strategy configuration.
//!
//! Session logs carry the fingerprint so two sessions can be compared knowing
//! they ran with identical thresholds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::StrategyConfig;

/// BLAKE3 hash of the canonical JSON serialization of a `StrategyConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigFingerprint(pub String);

impl ConfigFingerprint {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// First 12 hex characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StrategyConfig {
    /// Struct field order is fixed, so the JSON is deterministic.
    pub fn fingerprint(&self) -> ConfigFingerprint {
        let json = serde_json::to_string(self).unwrap_or_default();
        ConfigFingerprint::from_bytes(json.as_bytes())
    }
}
