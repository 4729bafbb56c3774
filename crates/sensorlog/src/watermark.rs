// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Latest timestamp already stored for a host.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use std::fmt;

/// Exclusive lower bound for new ingestion.
///
/// [`Watermark::EPOCH`] stands for "nothing stored yet" so that comparisons
/// never special-case absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    /// 1970-01-01T00:00:00Z, ingest everything.
    pub const EPOCH: Watermark = Watermark(DateTime::<Utc>::UNIX_EPOCH);

    pub fn new(at: DateTime<Utc>) -> Self {
        Watermark(at)
    }

    pub fn at(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn is_epoch(&self) -> bool {
        *self == Self::EPOCH
    }

    /// Calendar date of the watermark in the given offset.
    pub fn date_in(&self, offset: FixedOffset) -> NaiveDate {
        self.0.with_timezone(&offset).date_naive()
    }

    /// True when `ts` is strictly after the watermark.
    pub fn admits(&self, ts: DateTime<Utc>) -> bool {
        ts > self.0
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::EPOCH
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(at: DateTime<Utc>) -> Self {
        Watermark(at)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
