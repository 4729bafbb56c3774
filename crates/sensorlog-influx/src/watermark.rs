// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Watermark resolution.
//!
//! One `LAST(value)` query over every unit series, filtered by host. The
//! latest of the per-series timestamps is the watermark.

use crate::store::{Series, StoreError, TimeSeriesStore};
use chrono::{DateTime, Utc};
use sensorlog::Watermark;
use tracing::{debug, info};

/// Build the `LAST(value)` statement over the given series. The host is
/// bound as `$host`.
pub fn last_value_statement(series: &[&str]) -> String {
    let from = series
        .iter()
        .map(|name| format!("\"{}\"", name.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(",");
    format!("SELECT LAST(value) FROM {} WHERE host=$host", from)
}

/// Resolve the watermark for `hostname`.
///
/// Returns [`Watermark::EPOCH`] when the store holds nothing for the host.
pub fn resolve_watermark<S>(store: &S, hostname: &str, series: &[&str]) -> Result<Watermark, StoreError>
where
    S: TimeSeriesStore + ?Sized,
{
    let statement = last_value_statement(series);
    let results = store.query(&statement, &[("host", hostname)])?;

    let mut watermark = Watermark::EPOCH;
    for s in &results {
        let last = last_time(s)?;
        debug!(series = %s.name, last = %last, "last stored point");
        watermark = watermark.max(Watermark::new(last));
    }

    if watermark.is_epoch() {
        info!(host = hostname, "no stored points for host, importing everything");
    } else {
        info!(host = hostname, watermark = %watermark, "resolved watermark");
    }
    Ok(watermark)
}

/// Timestamp of the single row of a `LAST` series.
fn last_time(series: &Series) -> Result<DateTime<Utc>, StoreError> {
    let column = series
        .columns
        .iter()
        .position(|c| c == "time")
        .unwrap_or(0);
    let row = series
        .values
        .first()
        .ok_or_else(|| StoreError::ResponseShape(format!("series {:?} has no rows", series.name)))?;
    let raw = row
        .get(column)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            StoreError::ResponseShape(format!("series {:?} has no time value", series.name))
        })?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::ResponseShape(format!("series {:?} time {:?}: {}", series.name, raw, e))
        })
}
