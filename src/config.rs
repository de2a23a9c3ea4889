//! Configuration loading and parsing for `darkscope.toml` files.
//!
//! Every field is optional; a missing file or an empty file yields the
//! defaults.
use log::*;
use serde::Deserialize;
use std::{path::Path, time::Duration};

use crate::{
    error::{DarkscopeError, Result},
    signal::SignalKind,
};

/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "darkscope.toml";

/// Delay between a theme mutation and the follow-up re-detection.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Application mount points watched by the change monitor in addition to
/// the root and body elements.
pub const DEFAULT_APP_ROOT_IDS: [&str; 5] = ["root", "app", "__next", "__nuxt", "__layout"];

/// Root configuration structure for `darkscope.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)] // Use default for missing fields
pub struct DetectorConfig {
    /// Skip rules that scan every element of the document (default: false)
    pub skip_expensive: bool,
    /// Signal categories to leave out entirely.
    pub disabled_kinds: Vec<SignalKind>,
    /// Debounce window for the change monitor in milliseconds.
    pub debounce_ms: u64,
    /// Element ids watched by the change monitor when present.
    pub app_root_ids: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            skip_expensive: false,
            disabled_kinds: vec![],
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            app_root_ids: DEFAULT_APP_ROOT_IDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DetectorConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: DetectorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(
                "no config found at {}: using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(DarkscopeError::invalid_config(
                "debounce_ms must be greater than 0",
            ));
        }

        if self.app_root_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(DarkscopeError::invalid_config(
                "app_root_ids must not contain empty ids",
            ));
        }

        Ok(())
    }
}
