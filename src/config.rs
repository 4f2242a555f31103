//! Runtime configuration.
//!
//! Read from an optional TOML file; every key has a default:
//! ```toml
//! database = "bankroll.db"
//! session_timeout_secs = 30
//! busy_timeout_ms = 5000
//! conversion_rate = 0.74
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::application::DEFAULT_CONVERSION_RATE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file
    pub database: String,
    /// Upper bound on one ledger transaction, session acquisition included
    pub session_timeout_secs: u64,
    /// How long a session waits for another writer's lock
    pub busy_timeout_ms: u64,
    /// Rate used by the by-type report for the converted totals
    pub conversion_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "bankroll.db".to_string(),
            session_timeout_secs: 30,
            busy_timeout_ms: 5_000,
            conversion_rate: DEFAULT_CONVERSION_RATE,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.database.is_empty(), "database path must not be empty");
        ensure!(self.session_timeout_secs > 0, "session_timeout_secs must be positive");
        ensure!(
            self.conversion_rate.is_finite() && self.conversion_rate > 0.0,
            "conversion_rate must be a positive number"
        );
        Ok(())
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
