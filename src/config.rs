// Runtime configuration
//
// Resolved from the process environment (optionally seeded by a `.env` file):
//   DATABASE_PATH             SQLite file, empty or unset -> casino.db
//   LEDGER_BUSY_TIMEOUT_SECS  how long a connection waits on a locked database
//   LEDGER_LOG_FILE           where the terminal UI writes its log

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_DATABASE_PATH: &str = "casino.db";
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOG_FILE: &str = "casino-ledger.log";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub busy_timeout: Duration,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            busy_timeout: Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl Config {
    /// Load `.env` (if any) and resolve settings from the environment.
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine, variables may come from the shell
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_path = match non_empty("DATABASE_PATH") {
            Some(path) => PathBuf::from(path),
            None => {
                debug!("DATABASE_PATH not set, using default {}", DEFAULT_DATABASE_PATH);
                PathBuf::from(DEFAULT_DATABASE_PATH)
            }
        };

        let busy_timeout = match non_empty("LEDGER_BUSY_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| {
                    Error::Config(format!("LEDGER_BUSY_TIMEOUT_SECS must be whole seconds, got '{}': {}", raw, e))
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS),
        };

        let log_file = non_empty("LEDGER_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        Ok(Self {
            database_path,
            busy_timeout,
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_database_path_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_PATH", "")])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("casino.db"));
    }

    #[test]
    fn test_values_from_environment() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_PATH", "/tmp/ledger.db"),
            ("LEDGER_BUSY_TIMEOUT_SECS", "12"),
            ("LEDGER_LOG_FILE", "/tmp/ledger.log"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.busy_timeout, Duration::from_secs(12));
        assert_eq!(config.log_file, PathBuf::from("/tmp/ledger.log"));
    }

    #[test]
    fn test_bad_timeout_is_config_error() {
        let err = Config::from_lookup(lookup_from(&[("LEDGER_BUSY_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
