// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Batched point writer.

use crate::buffer::RequestBuffer;
use crate::influx::encode_point;
use crate::store::{StoreError, TimeSeriesStore};
use chrono::{DateTime, Utc};
use sensorlog::Point;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Default number of points per write request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Counters for one writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Points handed to the store.
    pub points: u64,
    /// `write_batch` calls made.
    pub batches: u64,
}

impl fmt::Display for WriteStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} points in {} batches", self.points, self.batches)
    }
}

/// Encodes points and writes them to a store in batches.
///
/// Consecutive points with the same timestamp form one log row, and a batch
/// only ever ends between rows. A run that stops halfway therefore leaves
/// the store holding whole rows, and the next run's watermark never lands
/// on a row that is missing points. A row that alone exceeds the batch size
/// is written as one oversized batch.
///
/// Points not yet written are only sent by [`flush`](Self::flush) or
/// [`finish`](Self::finish); dropping the writer discards them.
pub struct StoreWriter<S> {
    store: S,
    buffer: RequestBuffer,
    row: Vec<String>,
    row_timestamp: Option<DateTime<Utc>>,
    stats: WriteStats,
}

impl<S: TimeSeriesStore> StoreWriter<S> {
    /// Writer that sends a batch once `batch_size` points are ready.
    pub fn new(store: S, batch_size: usize) -> Self {
        Self::with_flush_interval(store, batch_size, Duration::MAX)
    }

    /// Writer that also sends a batch once `flush_interval` has passed since
    /// the previous write.
    pub fn with_flush_interval(store: S, batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            store,
            buffer: RequestBuffer::new(batch_size, flush_interval),
            row: Vec::new(),
            row_timestamp: None,
            stats: WriteStats::default(),
        }
    }

    pub fn write(&mut self, point: &Point<'_>) -> Result<(), StoreError> {
        if self.row_timestamp.is_some_and(|ts| ts != point.timestamp) {
            self.end_row()?;
        }
        self.row_timestamp = Some(point.timestamp);
        self.row.push(encode_point(point));
        Ok(())
    }

    /// Write every point of `points`, stopping at the first store error.
    pub fn write_all<'a, I>(&mut self, points: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = Point<'a>>,
    {
        for point in points {
            self.write(&point)?;
        }
        Ok(())
    }

    /// Write everything received so far, including the row in progress.
    ///
    /// Call this only when the row in progress is known to be complete.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.end_row()?;
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = self.buffer.take();
        self.send(batch)
    }

    /// Flush and return the counters.
    pub fn finish(mut self) -> Result<WriteStats, StoreError> {
        self.flush()?;
        Ok(self.stats)
    }

    pub fn stats(&self) -> WriteStats {
        self.stats
    }

    /// Points received but not yet written.
    pub fn pending(&self) -> usize {
        self.buffer.len() + self.row.len()
    }

    fn end_row(&mut self) -> Result<(), StoreError> {
        self.row_timestamp = None;
        if self.row.is_empty() {
            return Ok(());
        }
        if !self.buffer.fits(self.row.len()) {
            let batch = self.buffer.take();
            self.send(batch)?;
        }
        let row = std::mem::take(&mut self.row);
        if let Some(batch) = self.buffer.push_row(row) {
            self.send(batch)?;
        }
        Ok(())
    }

    fn send(&mut self, batch: Vec<String>) -> Result<(), StoreError> {
        debug!(points = batch.len(), "writing batch");
        self.store.write_batch(&batch)?;
        self.stats.points += batch.len() as u64;
        self.stats.batches += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Series};
    use chrono::{Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
    use sensorlog::sensors::parse_block;
    use sensorlog::{Catalog, TempUnits, Value};
    use std::cell::RefCell;

    fn catalog() -> Catalog {
        let blocks = vec![parse_block(
            "Volt 0 from Board\nactive=true\nlogged=true\nname=Vcore",
        )
        .unwrap()];
        Catalog::build_with_offset(
            &blocks,
            TempUnits::Celsius,
            "rig",
            FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap()
    }

    fn points(catalog: &Catalog, n: i64) -> Vec<Point<'_>> {
        let metric = catalog.metric("Vcore").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| Point {
                metric,
                timestamp: start + ChronoDuration::seconds(i),
                value: Value::Float(1.2),
            })
            .collect()
    }

    #[test]
    fn test_batches_by_size() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let mut writer = StoreWriter::new(&store, 2);

        writer.write_all(points(&catalog, 5)).unwrap();
        assert_eq!(store.batches(), 2);
        assert_eq!(writer.pending(), 1);

        let stats = writer.finish().unwrap();
        assert_eq!(stats, WriteStats { points: 5, batches: 3 });
        assert_eq!(store.lines().len(), 5);
        assert_eq!(
            store.lines()[0],
            "V,chipset=Board,host=rig,index=0,metric=Vcore value=1.2 1704067200"
        );
    }

    #[test]
    fn test_finish_without_points_writes_nothing() {
        let store = MemoryStore::new();
        let writer = StoreWriter::new(&store, DEFAULT_BATCH_SIZE);
        assert_eq!(writer.finish().unwrap(), WriteStats::default());
        assert_eq!(store.batches(), 0);
    }

    #[test]
    fn test_flush_interval() {
        let catalog = catalog();
        let store = MemoryStore::new();
        let mut writer = StoreWriter::with_flush_interval(&store, 1000, Duration::ZERO);

        // The last row stays open until the next timestamp or a flush.
        writer.write_all(points(&catalog, 3)).unwrap();
        assert_eq!(store.batches(), 2);
        assert_eq!(writer.pending(), 1);
        assert_eq!(writer.finish().unwrap(), WriteStats { points: 3, batches: 3 });
    }

    /// Records every batch it receives, optionally failing from the
    /// `fail_from`-th write on.
    struct Recorder {
        batches: RefCell<Vec<Vec<String>>>,
        fail_from: usize,
    }

    impl Recorder {
        fn new(fail_from: usize) -> Self {
            Self {
                batches: RefCell::new(Vec::new()),
                fail_from,
            }
        }
    }

    impl TimeSeriesStore for Recorder {
        fn query(&self, _: &str, _: &[(&str, &str)]) -> Result<Vec<Series>, StoreError> {
            Ok(Vec::new())
        }

        fn write_batch(&self, lines: &[String]) -> Result<(), StoreError> {
            let mut batches = self.batches.borrow_mut();
            if batches.len() + 1 >= self.fail_from {
                return Err(StoreError::Http {
                    status: 500,
                    body: "engine: shard is closed".into(),
                });
            }
            batches.push(lines.to_vec());
            Ok(())
        }
    }

    fn two_metric_catalog() -> Catalog {
        let blocks = vec![
            parse_block("Temp 0 from Core\nactive=true\nlogged=true\nname=CPU").unwrap(),
            parse_block("Fan 0 from Board\nactive=true\nlogged=true\nname=Fan1").unwrap(),
        ];
        Catalog::build_with_offset(
            &blocks,
            TempUnits::Celsius,
            "rig",
            FixedOffset::east_opt(0).unwrap(),
        )
        .unwrap()
    }

    fn rows(catalog: &Catalog, n: i64) -> Vec<Point<'_>> {
        let cpu = catalog.metric("CPU").unwrap();
        let fan = catalog.metric("Fan1").unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .flat_map(|i| {
                let timestamp = start + ChronoDuration::seconds(10 * i);
                [
                    Point {
                        metric: cpu,
                        timestamp,
                        value: Value::Float(40.0),
                    },
                    Point {
                        metric: fan,
                        timestamp,
                        value: Value::Integer(1400),
                    },
                ]
            })
            .collect()
    }

    #[test]
    fn test_batches_never_split_a_row() {
        let catalog = two_metric_catalog();
        let store = Recorder::new(usize::MAX);
        let mut writer = StoreWriter::new(&store, 3);

        writer.write_all(rows(&catalog, 4)).unwrap();
        let stats = writer.finish().unwrap();

        assert_eq!(stats, WriteStats { points: 8, batches: 4 });
        for batch in store.batches.borrow().iter() {
            assert_eq!(batch.len(), 2);
            assert!(batch[0].starts_with("°C,"));
            assert!(batch[1].starts_with("RPM,"));
            assert_eq!(
                batch[0].rsplit(' ').next(),
                batch[1].rsplit(' ').next(),
                "batch mixes rows: {:?}",
                batch
            );
        }
    }

    #[test]
    fn test_failed_batch_leaves_whole_rows_behind() {
        let catalog = two_metric_catalog();
        let store = Recorder::new(2);
        let mut writer = StoreWriter::new(&store, 3);

        let err = writer.write_all(rows(&catalog, 4)).unwrap_err();
        assert!(err.is_transient());

        // Only the first row made it; the second row is not half-written.
        let batches = store.batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert!(batches[0].iter().all(|line| line.ends_with(" 1704067200")));
    }

    #[test]
    fn test_row_wider_than_batch_is_sent_whole() {
        let catalog = two_metric_catalog();
        let store = Recorder::new(usize::MAX);
        let mut writer = StoreWriter::new(&store, 1);

        writer.write_all(rows(&catalog, 2)).unwrap();
        assert_eq!(writer.finish().unwrap(), WriteStats { points: 4, batches: 2 });
        assert!(store.batches.borrow().iter().all(|b| b.len() == 2));
    }

    #[test]
    fn test_store_error_propagates() {
        struct Down;
        impl TimeSeriesStore for Down {
            fn query(
                &self,
                _: &str,
                _: &[(&str, &str)],
            ) -> Result<Vec<Series>, StoreError> {
                Err(StoreError::Unreachable("down".into()))
            }
            fn write_batch(&self, _: &[String]) -> Result<(), StoreError> {
                Err(StoreError::Unreachable("down".into()))
            }
        }

        let catalog = catalog();
        let mut writer = StoreWriter::new(Down, 1);
        assert!(writer.write_all(points(&catalog, 2)).is_err());
        assert_eq!(writer.stats(), WriteStats::default());
    }
}
