//! Runtime configuration, read from a TOML file.
//!
//! ```toml
//! store_path = "library.json"
//! event_capacity = 256
//!
//! [scan]
//! legacy_key_shapes = true
//!
//! [log]
//! filter = "info"
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use crate::events::DEFAULT_CHANNEL_CAPACITY;
use crate::scanner::ScanOptions;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_store_path() -> PathBuf {
    PathBuf::from("library.json")
}

fn default_event_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Logging settings. `RUST_LOG` takes precedence over `filter` when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// An `EnvFilter` directive such as `info` or `bookkeep=debug`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// File the in-memory store is loaded from and saved to.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Change events buffered per subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub scan: ScanOptions,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            event_capacity: default_event_capacity(),
            scan: ScanOptions::default(),
            log: LogConfig::default(),
        }
    }
}

impl LibraryConfig {
    /// Loads and validates the config at `path`. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "store_path must not be empty".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_capacity must be >= 1, got 0".to_string(),
            ));
        }
        if self.log.filter.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "log.filter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
