// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Time-series store abstraction.
//!
//! The importer needs exactly two operations from the store: a read query
//! (used for the watermark) and a batched write.

use chrono::{DateTime, SecondsFormat};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use thiserror::Error;

/// Store errors. All of them are fatal for the run; a re-run is safe.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request timed out: {0}")]
    Timeout(String),

    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("store rejected query: {0}")]
    Query(String),

    #[error("unexpected store response: {0}")]
    ResponseShape(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Unreachable(_) => true,
            StoreError::Http { status, .. } => *status >= 500,
            StoreError::Query(_) | StoreError::ResponseShape(_) => false,
        }
    }
}

/// One series of a query result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

/// Time-series store seam.
///
/// # Implementations
///
/// - `InfluxClient` -- InfluxDB 1.x HTTP API
/// - `MemoryStore` -- in-process, backs the import tests
pub trait TimeSeriesStore {
    /// Run a single read statement with bound parameters.
    ///
    /// Returns the series of the statement's result; an empty vector when
    /// nothing matched.
    fn query(&self, statement: &str, params: &[(&str, &str)]) -> Result<Vec<Series>, StoreError>;

    /// Write a batch of Line Protocol lines (second precision).
    fn write_batch(&self, lines: &[String]) -> Result<(), StoreError>;
}

impl<S: TimeSeriesStore + ?Sized> TimeSeriesStore for &S {
    fn query(&self, statement: &str, params: &[(&str, &str)]) -> Result<Vec<Series>, StoreError> {
        (**self).query(statement, params)
    }

    fn write_batch(&self, lines: &[String]) -> Result<(), StoreError> {
        (**self).write_batch(lines)
    }
}

/// In-memory store for tests.
///
/// Dry runs do not use it; the importer prints their lines instead. It keeps
/// every written line and answers queries as
/// `SELECT LAST(value) ... WHERE host=$host` would: one series per
/// measurement holding the latest point written for the bound `host`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lines: RefCell<Vec<String>>,
    batches: RefCell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// Number of `write_batch` calls.
    pub fn batches(&self) -> usize {
        *self.batches.borrow()
    }
}

impl TimeSeriesStore for MemoryStore {
    fn query(&self, _statement: &str, params: &[(&str, &str)]) -> Result<Vec<Series>, StoreError> {
        let host = params.iter().find(|(k, _)| *k == "host").map(|(_, v)| *v);

        let mut latest: BTreeMap<String, (i64, String)> = BTreeMap::new();
        for line in self.lines.borrow().iter() {
            let parsed = ParsedLine::parse(line)
                .ok_or_else(|| StoreError::ResponseShape(format!("unreadable line {:?}", line)))?;
            let host_matches = host.map_or(true, |h| {
                parsed.tags.iter().any(|(k, v)| k == "host" && v == h)
            });
            if !host_matches {
                continue;
            }
            let newer = latest
                .get(&parsed.measurement)
                .map_or(true, |(ts, _)| parsed.timestamp >= *ts);
            if newer {
                latest.insert(parsed.measurement, (parsed.timestamp, parsed.value));
            }
        }

        latest
            .into_iter()
            .map(|(name, (ts, value))| {
                let time = DateTime::from_timestamp(ts, 0)
                    .ok_or_else(|| StoreError::ResponseShape(format!("timestamp {} out of range", ts)))?
                    .to_rfc3339_opts(SecondsFormat::Secs, true);
                Ok(Series {
                    name,
                    columns: vec!["time".to_string(), "last".to_string()],
                    values: vec![vec![serde_json::Value::String(time), field_json(&value)]],
                })
            })
            .collect()
    }

    fn write_batch(&self, lines: &[String]) -> Result<(), StoreError> {
        self.lines.borrow_mut().extend_from_slice(lines);
        *self.batches.borrow_mut() += 1;
        Ok(())
    }
}

/// The parts of a Line Protocol line the memory store needs.
struct ParsedLine {
    measurement: String,
    tags: Vec<(String, String)>,
    value: String,
    timestamp: i64,
}

impl ParsedLine {
    fn parse(line: &str) -> Option<Self> {
        let sections = split_unescaped(line, ' ');
        let [key, fields, timestamp] = sections.as_slice() else {
            return None;
        };

        let mut key_parts = split_unescaped(key, ',').into_iter();
        let measurement = unescape(key_parts.next()?);
        let tags = key_parts
            .map(|tag| {
                let kv = split_unescaped(tag, '=');
                match kv.as_slice() {
                    [k, v] => Some((unescape(k), unescape(v))),
                    _ => None,
                }
            })
            .collect::<Option<Vec<_>>>()?;

        let (_, value) = fields.split_once('=')?;
        Some(Self {
            measurement,
            tags,
            value: value.to_string(),
            timestamp: timestamp.parse().ok()?,
        })
    }
}

/// Split on `sep` where it is not preceded by a backslash.
fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Convert an encoded field value back to JSON.
fn field_json(raw: &str) -> serde_json::Value {
    if let Some(n) = raw.strip_suffix('i').and_then(|n| n.parse::<i64>().ok()) {
        return serde_json::Value::from(n);
    }
    raw.parse::<f64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Timeout("t".into()).is_transient());
        assert!(StoreError::Unreachable("u".into()).is_transient());
        assert!(StoreError::Http { status: 503, body: String::new() }.is_transient());
        assert!(!StoreError::Http { status: 401, body: String::new() }.is_transient());
        assert!(!StoreError::ResponseShape("s".into()).is_transient());
        assert!(!StoreError::Query("q".into()).is_transient());
    }

    #[test]
    fn test_split_unescaped() {
        assert_eq!(split_unescaped("a\\ b c", ' '), vec!["a\\ b", "c"]);
        assert_eq!(split_unescaped("m,k=v\\,w", ','), vec!["m", "k=v\\,w"]);
        assert_eq!(unescape("ISA\\ 0x290"), "ISA 0x290");
    }

    #[test]
    fn test_memory_store_last_per_measurement_and_host() {
        let store = MemoryStore::new();
        store
            .write_batch(&[
                "°C,host=rig,metric=CPU value=45.2 1704067210".to_string(),
                "°C,host=rig,metric=CPU value=46 1704067220".to_string(),
                "RPM,chipset=ISA\\ 0x290,host=rig,metric=Fan1 value=1500i 1704067215".to_string(),
                "°C,host=other,metric=CPU value=50 1704070000".to_string(),
            ])
            .unwrap();
        assert_eq!(store.batches(), 1);

        let series = store.query("SELECT LAST(value)", &[("host", "rig")]).unwrap();
        assert_eq!(series.len(), 2);

        let rpm = series.iter().find(|s| s.name == "RPM").unwrap();
        assert_eq!(rpm.values[0][0], serde_json::json!("2024-01-01T00:00:15Z"));
        assert_eq!(rpm.values[0][1], serde_json::json!(1500));

        let temp = series.iter().find(|s| s.name == "°C").unwrap();
        assert_eq!(temp.values[0][0], serde_json::json!("2024-01-01T00:00:20Z"));
        assert_eq!(temp.values[0][1], serde_json::json!(46.0));
    }

    #[test]
    fn test_memory_store_empty() {
        let store = MemoryStore::new();
        assert!(store.query("SELECT LAST(value)", &[("host", "rig")]).unwrap().is_empty());
    }
}
