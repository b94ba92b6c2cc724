//! Layered configuration
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! yields a working configuration and new keys never break old files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::{CredibilityPolicy, DEFAULT_FORWARD_TIMEOUT_SECS, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_title_max() -> usize {
    TITLE_MAX_CHARS
}

fn default_summary_max() -> usize {
    SUMMARY_MAX_CHARS
}

/// Text truncation limits applied by the sanitizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default = "default_title_max")]
    pub title_max_chars: usize,
    #[serde(default = "default_summary_max")]
    pub summary_max_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            title_max_chars: default_title_max(),
            summary_max_chars: default_summary_max(),
        }
    }
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

/// Store access settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Upper bound on any single store call
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    /// JSON snapshot loaded on open and written on close
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_store_timeout_ms(),
            snapshot_path: None,
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_forward_timeout_secs() -> u64 {
    DEFAULT_FORWARD_TIMEOUT_SECS
}

fn default_max_concurrent() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_rotate_user_agent() -> bool {
    true
}

/// Collector and forwarder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorSettings {
    /// Per-item bound when forwarding a candidate to the core
    #[serde(default = "default_forward_timeout_secs")]
    pub forward_timeout_secs: u64,
    /// Candidates in flight at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Bound on fetching a source page or feed
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_rotate_user_agent")]
    pub rotate_user_agent: bool,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            forward_timeout_secs: default_forward_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            request_timeout_secs: default_request_timeout_secs(),
            rotate_user_agent: default_rotate_user_agent(),
        }
    }
}

impl CollectorSettings {
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_secs(self.forward_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub credibility: CredibilityPolicy,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub collector: CollectorSettings,
}

impl CoreConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
