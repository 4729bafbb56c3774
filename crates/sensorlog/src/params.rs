// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! SpeedFan program options (`speedfanparams.cfg`).
//!
//! The file is a flat list of `key=value` lines with no section header.
//! Keys are matched case-insensitively, `:` is accepted as a delimiter and
//! `#`/`;` start comment lines.

use crate::catalog::TempUnits;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the program options inside the SpeedFan directory.
pub const PARAMS_FILE: &str = "speedfanparams.cfg";

/// File name of the sensor definitions inside the SpeedFan directory.
pub const SENSORS_FILE: &str = "speedfansens.cfg";

/// Errors raised while reading the options file.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: expected `key=value`, got {content:?}")]
    Malformed { line: usize, content: String },

    #[error("missing option `{0}`")]
    Missing(String),

    #[error("option `{key}` is not a boolean: {value:?}")]
    NotBoolean { key: String, value: String },
}

/// Parsed SpeedFan options.
#[derive(Debug, Clone, Default)]
pub struct SpeedFanParams {
    values: HashMap<String, String>,
}

impl SpeedFanParams {
    /// Parse options from the raw file contents.
    pub fn parse(text: &str) -> Result<Self, ParamsError> {
        let mut values = HashMap::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let split_at = line
                .find(['=', ':'])
                .ok_or_else(|| ParamsError::Malformed {
                    line: idx + 1,
                    content: line.to_string(),
                })?;
            let key = line[..split_at].trim().to_ascii_lowercase();
            let value = line[split_at + 1..].trim().to_string();
            values.insert(key, value);
        }

        Ok(Self { values })
    }

    /// Read `speedfanparams.cfg` from a SpeedFan directory.
    pub fn load(dir: &Path) -> Result<Self, ParamsError> {
        let path = dir.join(PARAMS_FILE);
        let text = std::fs::read_to_string(&path).map_err(|source| ParamsError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Raw string value of an option.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Boolean value of an option.
    ///
    /// Accepts `1/0`, `true/false`, `yes/no` and `on/off` in any case.
    pub fn get_bool(&self, key: &str) -> Result<bool, ParamsError> {
        let raw = self
            .get(key)
            .ok_or_else(|| ParamsError::Missing(key.to_string()))?;
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ParamsError::NotBoolean {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Temperature units selected by `UseCelsius`.
    pub fn temp_units(&self) -> Result<TempUnits, ParamsError> {
        Ok(TempUnits::from_use_celsius(self.get_bool("UseCelsius")?))
    }

    /// Whether log files start with a header row (`LogAddHeader`).
    pub fn log_has_header(&self) -> Result<bool, ParamsError> {
        self.get_bool("LogAddHeader")
    }
}
