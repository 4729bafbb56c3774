// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Observations emitted by the ingestor.

use crate::catalog::Metric;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// A typed sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Temperatures, PWM duty cycles and voltages.
    Float(f64),
    /// Fan speeds.
    Integer(i64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
        }
    }
}

/// One observation ready for storage.
///
/// Borrows its metric from the catalog; the tag set is the metric's.
#[derive(Debug, Clone, PartialEq)]
pub struct Point<'a> {
    pub metric: &'a Metric,
    pub timestamp: DateTime<Utc>,
    pub value: Value,
}

impl<'a> Point<'a> {
    /// Measurement (series) name, i.e. the metric's unit label.
    pub fn measurement(&self) -> &'static str {
        self.metric.units()
    }

    pub fn tags(&self) -> &'a [(&'static str, String)] {
        self.metric.tags()
    }

    /// Timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn time_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
