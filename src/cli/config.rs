//! Configuration file
//!
//! JSON, every key optional:
//!
//! ```json
//! {
//!   "db_path": "tardigrade.db",
//!   "flex_db_path": "flexible.db",
//!   "log_level": "warn",
//!   "lock_writes": true,
//!   "sync_writes": true
//! }
//! ```
//!
//! A missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliErrorCode, CliResult};
use crate::observability::Severity;
use crate::storage::StoreOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Fixed-schema backing file
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Flexible-schema backing file
    #[serde(default = "default_flex_db_path")]
    pub flex_db_path: String,

    /// trace | info | warn | error | fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(flatten)]
    pub store: StoreOptions,
}

fn default_db_path() -> String {
    "tardigrade.db".to_string()
}

fn default_flex_db_path() -> String {
    "flexible.db".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn utf8_path(flag: &str, path: PathBuf) -> CliResult<String> {
    path.into_os_string().into_string().map_err(|raw| {
        CliError::new(
            CliErrorCode::InvalidArgument,
            format!("{} path is not valid UTF-8: {}", flag, Path::new(&raw).display()),
        )
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            flex_db_path: default_flex_db_path(),
            log_level: default_log_level(),
            store: StoreOptions::default(),
        }
    }
}

impl Config {
    /// Load configuration from file; defaults if the file is absent
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.db_path.trim().is_empty() {
            return Err(CliError::config_error("db_path must not be empty"));
        }
        if self.flex_db_path.trim().is_empty() {
            return Err(CliError::config_error("flex_db_path must not be empty"));
        }
        if self.db_path == self.flex_db_path {
            return Err(CliError::config_error(
                "db_path and flex_db_path must name different files",
            ));
        }
        if Severity::parse(&self.log_level).is_none() {
            return Err(CliError::config_error(format!(
                "Invalid log_level: '{}'. Use trace, info, warn, error or fatal.",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Applies command-line path overrides, then re-validates.
    ///
    /// Paths must be valid UTF-8; they are never rewritten lossily.
    pub fn with_overrides(mut self, db: Option<PathBuf>, flex_db: Option<PathBuf>) -> CliResult<Self> {
        if let Some(db) = db {
            self.db_path = utf8_path("--db", db)?;
        }
        if let Some(flex_db) = flex_db {
            self.flex_db_path = utf8_path("--flex-db", flex_db)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Minimum log severity
    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Warn)
    }

    pub fn db_path(&self) -> &Path {
        Path::new(&self.db_path)
    }

    pub fn flex_db_path(&self) -> &Path {
        Path::new(&self.flex_db_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("none.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.log_severity(), Severity::Warn);
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_json(r#"{"db_path":"a.db","sync_writes":false}"#).unwrap();
        assert_eq!(config.db_path, "a.db");
        assert_eq!(config.flex_db_path, "flexible.db");
        assert!(!config.store.sync_writes);
        assert!(config.store.lock_writes);
    }

    #[test]
    fn test_rejects_bad_level() {
        let err = Config::from_json(r#"{"log_level":"loud"}"#).unwrap_err();
        assert!(err.message().contains("log_level"));
    }

    #[test]
    fn test_rejects_shared_file() {
        let err = Config::from_json(r#"{"db_path":"x.db","flex_db_path":"x.db"}"#).unwrap_err();
        assert_eq!(err.code_str(), "TG_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_overrides() {
        let config = Config::default()
            .with_overrides(Some(PathBuf::from("a.db")), None)
            .unwrap();
        assert_eq!(config.db_path(), Path::new("a.db"));
        assert!(Config::default()
            .with_overrides(Some(PathBuf::from("flexible.db")), None)
            .is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_override_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = PathBuf::from(OsStr::from_bytes(b"bad\xff.db"));
        let err = Config::default().with_overrides(None, Some(raw.clone())).unwrap_err();
        assert_eq!(err.code_str(), "TG_CLI_INVALID_ARGUMENT");
        assert!(err.message().contains("--flex-db"));

        let err = Config::default().with_overrides(Some(raw), None).unwrap_err();
        assert_eq!(err.code_str(), "TG_CLI_INVALID_ARGUMENT");
    }

    #[test]
    fn test_load_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tardigrade.json");
        fs::write(&path, r#"{"log_level":"info"}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.log_severity(), Severity::Info);
    }
}
