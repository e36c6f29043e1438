//! Publish configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// overrides `staging_root`
pub const STAGING_ROOT_ENV: &str = "DEPOTPUB_STAGING_ROOT";
/// overrides `workspace_prefix`
pub const WORKSPACE_PREFIX_ENV: &str = "DEPOTPUB_WORKSPACE_PREFIX";
/// overrides `pending_lookback`
pub const PENDING_LOOKBACK_ENV: &str = "DEPOTPUB_PENDING_LOOKBACK";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// Publish transaction configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Directory the per-transaction workspace directories are created in.
    pub staging_root: PathBuf,
    /// Prefix of every generated workspace name.
    pub workspace_prefix: String,
    /// How many recent changelists cleanup looks at.
    pub pending_lookback: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            staging_root: std::env::temp_dir(),
            workspace_prefix: "depotpub_".to_string(),
            pending_lookback: 1000,
        }
    }
}

impl PublishConfig {
    /// Create a new configuration staging under the given directory.
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: staging_root.into(),
            ..Default::default()
        }
    }

    /// Defaults overlaid with the `DEPOTPUB_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|var| std::env::var(var).ok())
    }

    /// Overlay values from a variable lookup; unset or blank variables are skipped.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(root) = get(STAGING_ROOT_ENV) {
            self.staging_root = PathBuf::from(root);
        }
        if let Some(prefix) = get(WORKSPACE_PREFIX_ENV) {
            self.workspace_prefix = prefix;
        }
        if let Some(raw) = get(PENDING_LOOKBACK_ENV) {
            self.pending_lookback = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: PENDING_LOOKBACK_ENV,
                value: raw.clone(),
            })?;
        }

        Ok(self)
    }

    /// Set the workspace name prefix.
    pub fn workspace_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.workspace_prefix = prefix.into();
        self
    }

    /// Set the changelist lookback used by cleanup.
    pub fn pending_lookback(mut self, limit: usize) -> Self {
        self.pending_lookback = limit;
        self
    }
}
