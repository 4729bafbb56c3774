// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Incremental log ingestion.
//!
//! Reads `SFLog*.csv` files one row at a time and yields [`Point`]s that are
//! strictly newer than the [`Watermark`]. Filtering happens on two levels:
//!
//! - **file**: a log whose base date is before the watermark's date is not
//!   opened at all;
//! - **row**: a row whose timestamp is not after the watermark is dropped.
//!
//! A file dated on the watermark's own day is therefore read and filtered
//! row by row.

use crate::catalog::{Catalog, Metric, ELAPSED_COLUMN};
use crate::logfile::{find_logs, LogFile};
use crate::point::Point;
use crate::watermark::Watermark;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What to do with a cell that does not parse as its metric's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoercionPolicy {
    /// Log the cell, count it and keep going.
    #[default]
    Skip,
    /// Stop the run at the first bad cell.
    Abort,
}

/// Ingestion options.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Logs start with a header row naming their columns.
    pub has_header_row: bool,
    pub coercion: CoercionPolicy,
}

/// A cell that could not be converted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}:{row}: column {column:?} value {value:?} is not a valid {expected}", .file.display())]
pub struct CellCoercionError {
    pub file: PathBuf,
    /// 1-based line number in the file.
    pub row: usize,
    pub column: String,
    pub value: String,
    pub expected: &'static str,
}

/// Fatal ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to list logs in {}: {source}", .path.display())]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cell(#[from] CellCoercionError),
}

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub files_read: u64,
    pub files_skipped: u64,
    pub rows_read: u64,
    /// Rows at or before the watermark.
    pub rows_skipped: u64,
    pub points: u64,
    /// Cells dropped under [`CoercionPolicy::Skip`].
    pub cell_errors: u64,
    /// Points emitted per metric name.
    pub per_metric: BTreeMap<String, u64>,
}

/// Produces points from a log directory.
pub struct LogIngestor<'a> {
    catalog: &'a Catalog,
    watermark: Watermark,
    options: IngestOptions,
}

impl<'a> LogIngestor<'a> {
    pub fn new(catalog: &'a Catalog, watermark: Watermark, options: IngestOptions) -> Self {
        Self {
            catalog,
            watermark,
            options,
        }
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Start ingesting the logs of `dir`.
    ///
    /// Only the directory listing happens here; files are opened lazily as
    /// the returned stream is consumed.
    pub fn ingest(&self, dir: &Path) -> Result<PointStream<'a>, IngestError> {
        let files = find_logs(dir).map_err(|source| IngestError::ListDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(self.ingest_files(files))
    }

    /// Ingest an explicit list of log files, in the given order.
    pub fn ingest_files(&self, files: Vec<LogFile>) -> PointStream<'a> {
        PointStream {
            catalog: self.catalog,
            watermark: self.watermark,
            options: self.options,
            files: files.into(),
            current: None,
            pending: VecDeque::new(),
            stats: IngestStats::default(),
            done: false,
        }
    }
}

/// An open log file.
struct OpenLog<'a> {
    path: PathBuf,
    base: DateTime<Utc>,
    reader: BufReader<File>,
    /// Metric for each column position; `None` for the elapsed-seconds
    /// column and for columns the catalog does not know.
    columns: Vec<Option<&'a Metric>>,
    line_no: usize,
}

/// Lazy iterator over the points of a log directory.
///
/// Yields `Err` once on a fatal error and then ends.
pub struct PointStream<'a> {
    catalog: &'a Catalog,
    watermark: Watermark,
    options: IngestOptions,
    files: VecDeque<LogFile>,
    current: Option<OpenLog<'a>>,
    pending: VecDeque<Point<'a>>,
    stats: IngestStats,
    done: bool,
}

impl<'a> PointStream<'a> {
    /// Counters accumulated so far.
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn into_stats(self) -> IngestStats {
        self.stats
    }

    /// Open the next log that survives the file-level filter.
    fn open_next(&mut self) -> Result<Option<OpenLog<'a>>, IngestError> {
        let offset = self.catalog.offset();
        let cutoff = self.watermark.date_in(offset);

        while let Some(log) = self.files.pop_front() {
            if log.date < cutoff {
                tracing::info!(
                    file = %log.path.display(),
                    watermark = %self.watermark,
                    "skipping log older than watermark"
                );
                self.stats.files_skipped += 1;
                continue;
            }

            let read_err = |source| IngestError::Read {
                path: log.path.clone(),
                source,
            };
            let file = File::open(&log.path).map_err(read_err)?;
            let mut open = OpenLog {
                path: log.path.clone(),
                base: log.base_utc(offset),
                reader: BufReader::new(file),
                columns: Vec::new(),
                line_no: 0,
            };

            if self.options.has_header_row {
                match next_line(&mut open).map_err(read_err)? {
                    Some(header) => {
                        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
                        open.columns = self.columns_for(&open.path, &names);
                    }
                    None => {
                        tracing::warn!(file = %log.path.display(), "empty log file");
                        self.stats.files_read += 1;
                        continue;
                    }
                }
            } else {
                let names: Vec<&str> = self.catalog.header().iter().map(String::as_str).collect();
                open.columns = self.columns_for(&open.path, &names);
            }

            tracing::debug!(file = %log.path.display(), date = %log.date, "reading log");
            self.stats.files_read += 1;
            return Ok(Some(open));
        }

        Ok(None)
    }

    fn columns_for(&self, path: &Path, names: &[&str]) -> Vec<Option<&'a Metric>> {
        let catalog = self.catalog;
        let mut unknown = Vec::new();
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                if i == 0 || name.is_empty() {
                    return None;
                }
                let metric = catalog.metric(name);
                if metric.is_none() {
                    unknown.push(*name);
                }
                metric
            })
            .collect();

        if !unknown.is_empty() {
            tracing::warn!(
                file = %path.display(),
                columns = ?unknown,
                "ignoring columns with no active logged sensor"
            );
        }
        columns
    }

    /// Turn one row into pending points.
    fn process_row(&mut self, line: &str) -> Result<(), CellCoercionError> {
        let Some(open) = self.current.as_ref() else {
            return Ok(());
        };
        let cells: Vec<&str> = line.split('\t').collect();
        self.stats.rows_read += 1;

        let elapsed = cells[0].trim();
        let timestamp = elapsed
            .parse::<i64>()
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| open.base.checked_add_signed(d));
        let Some(timestamp) = timestamp else {
            let err = CellCoercionError {
                file: open.path.clone(),
                row: open.line_no,
                column: ELAPSED_COLUMN.to_string(),
                value: elapsed.to_string(),
                expected: "integer",
            };
            return self.reject(err);
        };

        if !self.watermark.admits(timestamp) {
            self.stats.rows_skipped += 1;
            return Ok(());
        }

        let mut errors = Vec::new();
        for (i, metric) in open.columns.iter().enumerate() {
            let Some(metric) = *metric else {
                continue;
            };
            let raw = cells.get(i).copied().unwrap_or("");
            match metric.coerce(raw) {
                Some(value) => {
                    self.pending.push_back(Point {
                        metric,
                        timestamp,
                        value,
                    });
                    self.stats.points += 1;
                    *self
                        .stats
                        .per_metric
                        .entry(metric.name().to_string())
                        .or_default() += 1;
                }
                None => errors.push(CellCoercionError {
                    file: open.path.clone(),
                    row: open.line_no,
                    column: metric.name().to_string(),
                    value: raw.trim().to_string(),
                    expected: metric.kind().value_type(),
                }),
            }
        }

        for err in errors {
            self.reject(err)?;
        }
        Ok(())
    }

    /// Apply the coercion policy to a bad cell.
    fn reject(&mut self, err: CellCoercionError) -> Result<(), CellCoercionError> {
        match self.options.coercion {
            CoercionPolicy::Skip => {
                tracing::warn!(
                    file = %err.file.display(),
                    row = err.row,
                    column = %err.column,
                    value = %err.value,
                    "skipping value that is not a valid {}",
                    err.expected
                );
                self.stats.cell_errors += 1;
                Ok(())
            }
            CoercionPolicy::Abort => Err(err),
        }
    }

    fn advance(&mut self) -> Result<(), IngestError> {
        if self.current.is_none() {
            self.current = self.open_next()?;
            if self.current.is_none() {
                self.done = true;
            }
            return Ok(());
        }

        let Some(open) = self.current.as_mut() else {
            return Ok(());
        };
        let line = next_line(open).map_err(|source| IngestError::Read {
            path: open.path.clone(),
            source,
        })?;

        match line {
            Some(line) => {
                let pending_before = self.pending.len();
                if let Err(err) = self.process_row(&line) {
                    // Keep the row all-or-nothing in strict mode.
                    self.pending.truncate(pending_before);
                    return Err(err.into());
                }
            }
            None => self.current = None,
        }
        Ok(())
    }
}

impl<'a> Iterator for PointStream<'a> {
    type Item = Result<Point<'a>, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(point) = self.pending.pop_front() {
                return Some(Ok(point));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.advance() {
                self.done = true;
                self.current = None;
                self.pending.clear();
                return Some(Err(err));
            }
        }
    }
}

/// Read the next non-blank line, tolerating CRLF and non-UTF-8 bytes.
fn next_line(open: &mut OpenLog<'_>) -> std::io::Result<Option<String>> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if open.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        open.line_no += 1;
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if !line.trim().is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
}
