// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! InfluxDB Line Protocol encoding.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 value=45.2 timestamp_s
//! ```
//!
//! Points are written with second precision (`precision=s`).
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use sensorlog::{Point, Value};

/// Name of the single field every point carries.
pub const VALUE_FIELD: &str = "value";

/// Format a value for Line Protocol.
///
/// - Float: written as-is (e.g., `45.2`)
/// - Integer: suffixed with `i` (e.g., `1500i`)
pub fn encode_value(value: Value) -> String {
    match value {
        Value::Float(v) => format!("{}", v),
        Value::Integer(v) => format!("{}i", v),
    }
}

/// Encode a point as one Line Protocol line.
///
/// Tags are sorted by key for canonical form; tags with empty values are
/// dropped since InfluxDB rejects them.
pub fn encode_point(point: &Point<'_>) -> String {
    let mut line = escape_measurement(point.measurement());

    let mut sorted_tags: Vec<_> = point
        .tags()
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .collect();
    sorted_tags.sort_by_key(|(k, _)| *k);
    for (key, value) in sorted_tags {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }

    line.push(' ');
    line.push_str(VALUE_FIELD);
    line.push('=');
    line.push_str(&encode_value(point.value));

    line.push(' ');
    line.push_str(&point.timestamp.timestamp().to_string());
    line
}

/// Escape a measurement name for Line Protocol.
/// Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace(' ', "\\ ")
}

/// Escape a tag key or value.
/// Commas, equals signs, and spaces must be escaped. Backslashes are doubled
/// first, otherwise one at the end of a value would escape the separator
/// that follows it.
fn escape_tag(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
