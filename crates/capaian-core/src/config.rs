//! Store configuration for capaian
//!
//! Configuration is stored in `capaian.toml` at the store root.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CapaianError, Result};

/// Current store format version
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Policy for the 100% weight-sum invariant
///
/// Validation always rejects sums above 100. The policy only decides whether
/// a sibling set totalling less than 100 counts as gradable when `check`
/// audits the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightPolicy {
    /// Partial coverage is acceptable indefinitely (sum <= 100)
    #[default]
    Permissive,
    /// A node is only gradable once its sibling weights total exactly 100
    Strict,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store format version for compatibility checking
    #[serde(default = "default_version")]
    pub version: u32,

    /// Weight-sum policy for gradability auditing
    #[serde(default)]
    pub weight_policy: WeightPolicy,

    /// Decimal places used when rendering scores for humans
    ///
    /// Presentation only; stored and intermediate values are never rounded.
    #[serde(default = "default_display_decimals")]
    pub display_decimals: u8,
}

impl StoreConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: StoreConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CapaianError::Other(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            version: STORE_FORMAT_VERSION,
            weight_policy: WeightPolicy::default(),
            display_decimals: default_display_decimals(),
        }
    }
}

fn default_version() -> u32 {
    STORE_FORMAT_VERSION
}

fn default_display_decimals() -> u8 {
    2
}
