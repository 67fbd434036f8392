//! Store configuration.
//!
//! ```toml
//! path = "/home/user/.myapp/contacts.db"
//! search_limit = 50
//! prefer_unexpired = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Configuration for opening a [`ContactStore`](crate::ContactStore).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database file; `None` keeps the store in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Result cap for searches that do not set their own limit.
    #[serde(default)]
    pub search_limit: Option<usize>,
    /// Rank non-expired keys above expired ones when picking the key for
    /// an email.
    #[serde(default = "default_prefer_unexpired")]
    pub prefer_unexpired: bool,
}

fn default_prefer_unexpired() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            search_limit: None,
            prefer_unexpired: default_prefer_unexpired(),
        }
    }
}

impl StoreConfig {
    /// Configuration for an on-disk store at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }
}
