use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Per-book configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of undo operations retained. The oldest operation is
    /// dropped once this is exceeded.
    pub undo_limit: usize,
    /// When `false`, undo recording primitives do nothing.
    pub undo_enabled: bool,
    /// Label of the operation synthesized to hold the initial state before
    /// the first recorded modification.
    pub baseline_label: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            undo_limit: 300,
            undo_enabled: true,
            baseline_label: "baseline".to_string(),
        }
    }
}

impl StoreConfig {
    /// A configuration with undo recording switched off.
    pub fn without_undo() -> Self {
        Self {
            undo_enabled: false,
            ..Default::default()
        }
    }

    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string(self).map_err(|e| StoreError::Config(e.to_string()))
    }
}
