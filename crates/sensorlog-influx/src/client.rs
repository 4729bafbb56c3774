// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! InfluxDB 1.x HTTP client.
//!
//! - Reads: `GET /query?db=..&q=..&params=..` (JSON response)
//! - Writes: `POST /write?db=..&precision=s` with a Line Protocol body
//!
//! Transient failures are retried with a doubling backoff.

use crate::config::InfluxDbConfig;
use crate::store::{Series, StoreError, TimeSeriesStore};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest pause between two retries, unless the configured backoff is
/// already longer.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

fn next_delay(delay: Duration) -> Duration {
    delay.saturating_mul(2).min(MAX_RETRY_DELAY).max(delay)
}

/// Body of a `/query` response.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    #[serde(default)]
    error: Option<String>,
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::Timeout(e.to_string())
        } else if e.is_decode() {
            StoreError::ResponseShape(e.to_string())
        } else {
            StoreError::Unreachable(e.to_string())
        }
    }
}

/// Blocking InfluxDB client.
pub struct InfluxClient {
    http: Client,
    base_url: String,
    database: String,
    credentials: Option<(String, Option<String>)>,
    retries: u32,
    backoff: Duration,
}

impl InfluxClient {
    pub fn new(config: &InfluxDbConfig) -> Result<Self, StoreError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            database: config.database.clone(),
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
            retries: config.retries,
            backoff: config.retry_backoff(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, password.as_deref()),
            None => request,
        }
    }

    fn with_retries<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut delay = self.backoff;
        let mut attempt = 0;
        loop {
            match op() {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    warn!(error = %e, attempt, "{} failed, retrying in {:?}", what, delay);
                    std::thread::sleep(delay);
                    delay = next_delay(delay);
                }
                other => return other,
            }
        }
    }

    fn query_once(&self, statement: &str, params: &str) -> Result<Vec<Series>, StoreError> {
        let request = self
            .http
            .get(format!("{}/query", self.base_url))
            .query(&[("db", self.database.as_str()), ("q", statement), ("params", params)]);
        let response = self.authorize(request).send()?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let body = response.text().unwrap_or_default();
            return Err(StoreError::Query(query_error(&body).unwrap_or(body)));
        }
        let body: QueryResponse = check_status(response)?.json()?;
        statement_series(body)
    }

    fn write_once(&self, body: &str) -> Result<(), StoreError> {
        let request = self
            .http
            .post(format!("{}/write", self.base_url))
            .query(&[("db", self.database.as_str()), ("precision", "s")])
            .body(body.to_string());
        check_status(self.authorize(request).send()?)?;
        Ok(())
    }
}

impl TimeSeriesStore for InfluxClient {
    fn query(&self, statement: &str, params: &[(&str, &str)]) -> Result<Vec<Series>, StoreError> {
        let params = bind_params(params);
        debug!(statement, params = %params, "querying store");
        self.with_retries("query", || self.query_once(statement, &params))
    }

    fn write_batch(&self, lines: &[String]) -> Result<(), StoreError> {
        if lines.is_empty() {
            return Ok(());
        }
        let body = lines.join("\n");
        self.with_retries("write", || self.write_once(&body))
    }
}

/// Encode bound parameters as the JSON object `/query` expects.
fn bind_params(params: &[(&str, &str)]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = params
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    serde_json::Value::Object(map).to_string()
}

fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StoreError::Http {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        })
    }
}

fn query_error(body: &str) -> Option<String> {
    serde_json::from_str::<QueryResponse>(body).ok()?.error
}

/// Pull the series out of a single-statement response.
fn statement_series(body: QueryResponse) -> Result<Vec<Series>, StoreError> {
    if let Some(error) = body.error {
        return Err(StoreError::Query(error));
    }
    let result = body
        .results
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::ResponseShape("query returned no results".to_string()))?;
    match result.error {
        Some(error) => Err(StoreError::Query(error)),
        None => Ok(result.series),
    }
}
