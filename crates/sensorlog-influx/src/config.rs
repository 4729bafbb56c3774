// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! InfluxDB connection settings (the `[influxdb]` table of `sensorlog.toml`).

use serde::Deserialize;
use std::time::Duration;

/// InfluxDB 1.x connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InfluxDbConfig {
    /// Base URL (e.g., "http://localhost:8086").
    pub url: String,
    /// Target database.
    pub database: String,
    /// Basic-auth user. Anonymous when absent.
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Extra attempts for transient failures (timeouts, connection errors, 5xx).
    pub retries: u32,
    /// Delay before the first retry; doubled on each further attempt.
    pub retry_backoff_ms: u64,
}

impl Default for InfluxDbConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            database: "speedfan".to_string(),
            username: None,
            password: None,
            timeout_secs: 10,
            retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl InfluxDbConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}
