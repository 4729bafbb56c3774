// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Sensor definition dialect (`speedfansens.cfg`).
//!
//! Layout:
//! ```text
//! <preamble, ignored>
//! xxx the end
//! xxx Temp 0 from Core
//! xxx active=true
//! xxx logged=true
//! xxx name=CPU
//! xxx end
//! xxx Fan 1 from W83627DHG
//! ...
//! xxx end
//! ```
//!
//! Every block opens with `<Kind> <index> from <source>` followed by
//! `key=value` attribute lines. The `xxx` token is noise and is stripped.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Marker closing the preamble.
pub const PREAMBLE_END: &str = "xxx the end";

/// Marker closing each sensor block.
pub const BLOCK_END: &str = "xxx end";

/// Token prefixed to every line of a block.
const LINE_MARKER: &str = "xxx";

/// Separator between kind/index and source on a block's first line.
const SOURCE_SEPARATOR: &str = " from ";

/// Malformed sensor definitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("sensor definitions have no `xxx the end` marker")]
    MissingPreamble,

    #[error("block header {header:?} has no ` from ` separator")]
    MissingFrom { header: String },

    #[error("block header {header:?} has no valid sensor index")]
    BadIndex { header: String },

    #[error("block {header:?}: attribute line {line:?} is not `key=value`")]
    BadAttribute { header: String, line: String },
}

/// A coerced attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl AttrValue {
    /// Coerce a raw attribute string.
    ///
    /// Precedence: the literals `true`/`false` become booleans, then an
    /// integer parse is attempted, and anything else stays a string. `"1"`
    /// is therefore `Int(1)`, never `Bool(true)`.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "true" => AttrValue::Bool(true),
            "false" => AttrValue::Bool(false),
            _ => match raw.parse::<i64>() {
                Ok(n) => AttrValue::Int(n),
                Err(_) => AttrValue::Str(raw.to_string()),
            },
        }
    }

    /// Truthiness used for the `active`/`logged` switches.
    pub fn is_truthy(&self) -> bool {
        match self {
            AttrValue::Bool(b) => *b,
            AttrValue::Int(n) => *n != 0,
            AttrValue::Str(s) => !s.is_empty(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Int(n) => write!(f, "{}", n),
            AttrValue::Str(s) => f.write_str(s),
        }
    }
}

/// One sensor definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorBlock {
    /// Originating chipset/device, e.g. `Core` or `W83627DHG`.
    pub source: String,
    /// Kind label as written in the file (`Temp`, `Pwm`, `Fan`, `Volt`).
    pub kind_label: String,
    /// Position of the sensor within its source.
    pub index: i64,
    /// Coerced attributes by key.
    pub attributes: HashMap<String, AttrValue>,
}

impl SensorBlock {
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// True when the block is switched both `active` and `logged`.
    pub fn is_logged(&self) -> bool {
        let on = |key: &str| self.attr(key).is_some_and(AttrValue::is_truthy);
        on("active") && on("logged")
    }
}

/// Split the raw file contents into block bodies, dropping the preamble.
pub fn split_blocks(text: &str) -> Result<Vec<&str>, ParseError> {
    let (_, body) = text
        .split_once(PREAMBLE_END)
        .ok_or(ParseError::MissingPreamble)?;

    Ok(body
        .split(BLOCK_END)
        .filter(|block| !block.trim().is_empty())
        .collect())
}

/// Parse a single block body.
pub fn parse_block(block: &str) -> Result<SensorBlock, ParseError> {
    let cleaned = block.replace(LINE_MARKER, "");
    let mut lines = cleaned.lines().map(str::trim).filter(|l| !l.is_empty());

    let header = lines.next().unwrap_or_default().to_string();
    let (kind_and_index, source) =
        header
            .split_once(SOURCE_SEPARATOR)
            .ok_or_else(|| ParseError::MissingFrom {
                header: header.clone(),
            })?;

    let mut words = kind_and_index.split_whitespace();
    let kind_label = words.next().unwrap_or_default().to_string();
    let index = words
        .next()
        .and_then(|w| w.parse::<i64>().ok())
        .filter(|_| words.next().is_none())
        .ok_or_else(|| ParseError::BadIndex {
            header: header.clone(),
        })?;

    let mut attributes = HashMap::new();
    for line in lines {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ParseError::BadAttribute {
                header: header.clone(),
                line: line.to_string(),
            })?;
        attributes.insert(key.trim().to_string(), AttrValue::coerce(value.trim()));
    }

    Ok(SensorBlock {
        source: source.trim().to_string(),
        kind_label,
        index,
        attributes,
    })
}

/// Parse the whole sensor definitions file, preserving block order.
pub fn parse_sensors(text: &str) -> Result<Vec<SensorBlock>, ParseError> {
    split_blocks(text)?.into_iter().map(parse_block).collect()
}
