//! Configuration for a studyhall data directory.
//!
//! Resolution, lowest to highest precedence: built-in defaults, then
//! `.studyhall/config.toml`, then environment variables. Command-line flags
//! are applied on top by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The directory name for studyhall data
pub const DATA_DIR: &str = ".studyhall";

/// The database filename inside [`DATA_DIR`]
pub const DB_FILE: &str = "studyhall.db";

/// The config filename inside [`DATA_DIR`]
pub const CONFIG_FILE: &str = "config.toml";

/// Overrides the database path
pub const ENV_DB: &str = "STUDYHALL_DB";
/// Overrides the busy timeout (milliseconds)
pub const ENV_BUSY_TIMEOUT_MS: &str = "STUDYHALL_BUSY_TIMEOUT_MS";

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Database file. Relative paths resolve against the root directory.
    pub db_path: Option<PathBuf>,
    /// How long a writer waits on another process's write lock.
    pub busy_timeout_ms: u64,
    /// Identity used when neither `--as` nor `STUDYHALL_USER` is given.
    pub default_user: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            default_user: None,
        }
    }
}

impl Config {
    /// Load configuration for the data directory under `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let mut config = Self::load_file(&config_path(root))?.unwrap_or_default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a config file, returning `None` if it does not exist.
    pub fn load_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(Some(config))
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(db) = lookup(ENV_DB).filter(|s| !s.is_empty()) {
            self.db_path = Some(PathBuf::from(db));
        }
        if let Some(ms) = lookup(ENV_BUSY_TIMEOUT_MS).filter(|s| !s.is_empty()) {
            self.busy_timeout_ms = ms
                .trim()
                .parse()
                .with_context(|| {
                    format!("{ENV_BUSY_TIMEOUT_MS} must be a number of milliseconds, got '{ms}'")
                })?;
        }
        Ok(())
    }

    /// Resolved database path for `root`.
    #[must_use]
    pub fn db_path(&self, root: &Path) -> PathBuf {
        match &self.db_path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(DATA_DIR).join(DB_FILE),
        }
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Path of the config file under `root`.
#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    root.join(DATA_DIR).join(CONFIG_FILE)
}
