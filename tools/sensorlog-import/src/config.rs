// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Importer configuration (`sensorlog.toml`).
//!
//! ```toml
//! [influxdb]
//! url = "http://localhost:8086"
//! database = "speedfan"
//!
//! [import]
//! speedfan_dir = "C:/Program Files (x86)/SpeedFan"
//! batch_size = 100
//! ```

use sensorlog_influx::InfluxDbConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "sensorlog.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level importer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImporterConfig {
    #[serde(default)]
    pub influxdb: InfluxDbConfig,

    #[serde(default)]
    pub import: ImportConfig,
}

/// The `[import]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportConfig {
    /// SpeedFan directory holding the `.cfg` files and the logs.
    #[serde(default)]
    pub speedfan_dir: Option<PathBuf>,

    /// Value of the `host` tag. Defaults to the machine's hostname.
    #[serde(default)]
    pub hostname: Option<String>,

    /// Points per write request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Abort on the first unparsable cell instead of skipping it.
    #[serde(default)]
    pub strict: bool,
}

fn default_batch_size() -> usize {
    sensorlog_influx::writer::DEFAULT_BATCH_SIZE
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            speedfan_dir: None,
            hostname: None,
            batch_size: default_batch_size(),
            strict: false,
        }
    }
}

impl ImporterConfig {
    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load `explicit` if given, else [`DEFAULT_CONFIG_FILE`] when it exists,
    /// else built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.import.batch_size == 0 {
            return Err(ConfigError::Invalid("import.batch_size must be at least 1".into()));
        }
        if self.influxdb.database.is_empty() {
            return Err(ConfigError::Invalid("influxdb.database is empty".into()));
        }
        let url = &self.influxdb.url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "influxdb.url must be an http(s) URL, got {:?}",
                url
            )));
        }
        if matches!(&self.import.hostname, Some(h) if h.trim().is_empty()) {
            return Err(ConfigError::Invalid("import.hostname is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ImporterConfig::parse("").unwrap();
        assert_eq!(config.influxdb, InfluxDbConfig::default());
        assert_eq!(config.import, ImportConfig::default());
        assert_eq!(config.import.batch_size, 100);
        assert!(!config.import.strict);
    }

    #[test]
    fn test_full_document() {
        let config = ImporterConfig::parse(
            r#"
[influxdb]
url = "https://tsdb.lan:8086"
database = "telemetry"
username = "importer"
password = "secret"
timeout_secs = 30

[import]
speedfan_dir = "/mnt/speedfan"
hostname = "rig"
batch_size = 500
strict = true
"#,
        )
        .unwrap();

        assert_eq!(config.influxdb.database, "telemetry");
        assert_eq!(config.influxdb.timeout_secs, 30);
        assert_eq!(config.influxdb.retries, 3);
        assert_eq!(config.import.speedfan_dir, Some(PathBuf::from("/mnt/speedfan")));
        assert_eq!(config.import.hostname.as_deref(), Some("rig"));
        assert_eq!(config.import.batch_size, 500);
        assert!(config.import.strict);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            ImporterConfig::parse("[import]\nbatch_size = 0\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ImporterConfig::parse("[influxdb]\nurl = \"localhost:8086\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ImporterConfig::parse("[influxdb]\ndatabase = \"\"\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ImporterConfig::parse("[import]\nhostname = \" \"\n"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            ImporterConfig::parse("[import\n"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            ImporterConfig::parse("[import]\nbatch_size = \"many\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensorlog.toml");
        std::fs::write(&path, "[import]\nhostname = \"rig\"\n").unwrap();

        let config = ImporterConfig::load(Some(&path)).unwrap();
        assert_eq!(config.import.hostname.as_deref(), Some("rig"));

        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            ImporterConfig::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }
}
