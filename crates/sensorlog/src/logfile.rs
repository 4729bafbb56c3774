// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! SpeedFan log file discovery.
//!
//! SpeedFan writes one tab-delimited log per day named
//! `SFLogYYYYMMDD.csv`; the embedded date is the base every row's
//! elapsed-seconds column is added to.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Log file name prefix.
pub const LOG_PREFIX: &str = "SFLog";

/// Log file extension (matched case-insensitively).
pub const LOG_EXTENSION: &str = "csv";

/// Byte range of the `YYYYMMDD` date inside the file name.
const DATE_RANGE: Range<usize> = 5..13;

/// A log file and its base date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub date: NaiveDate,
}

/// Result of matching a directory entry against the log naming pattern.
#[derive(Debug, PartialEq, Eq)]
pub enum NameMatch {
    /// Not a SpeedFan log at all.
    Ignored,
    /// Looks like a log but the embedded date is unusable.
    BadDate(String),
    Log(LogFile),
}

impl LogFile {
    /// Match a path against `SFLog*.csv` and extract the base date.
    pub fn match_path(path: &Path) -> NameMatch {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return NameMatch::Ignored;
        };
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(LOG_EXTENSION));
        if !name.starts_with(LOG_PREFIX) || !is_csv {
            return NameMatch::Ignored;
        }

        let date = name
            .get(DATE_RANGE)
            .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| NaiveDate::parse_from_str(digits, "%Y%m%d").ok());

        match date {
            Some(date) => NameMatch::Log(LogFile {
                path: path.to_path_buf(),
                date,
            }),
            None => NameMatch::BadDate(name.to_string()),
        }
    }

    /// Local midnight of the base date, expressed in UTC.
    pub fn base_utc(&self, offset: FixedOffset) -> DateTime<Utc> {
        let local_midnight = self.date.and_time(NaiveTime::MIN);
        let utc = local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()));
        DateTime::from_naive_utc_and_offset(utc, Utc)
    }
}

/// List the SpeedFan logs of a directory, oldest first.
///
/// Files that match the prefix but carry no valid date are skipped with a
/// warning.
pub fn find_logs(dir: &Path) -> std::io::Result<Vec<LogFile>> {
    let mut logs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match LogFile::match_path(&path) {
            NameMatch::Log(log) => logs.push(log),
            NameMatch::BadDate(name) => {
                tracing::warn!(file = %name, "log file name has no valid YYYYMMDD date, skipping");
            }
            NameMatch::Ignored => {}
        }
    }

    logs.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
    Ok(logs)
}
