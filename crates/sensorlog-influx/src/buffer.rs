// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Line Protocol lines waiting for the next write request.
//!
//! Lines are added one log row at a time, so a request never carries part
//! of a row. A row is released together with the rest of the request once
//! the request holds `max_lines` lines, or once `max_age` has passed since
//! the previous request went out.

use std::time::{Duration, Instant};

pub struct RequestBuffer {
    lines: Vec<String>,
    max_lines: usize,
    max_age: Duration,
    last_request: Instant,
}

impl RequestBuffer {
    /// `max_lines` of zero is treated as one.
    pub fn new(max_lines: usize, max_age: Duration) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            lines: Vec::with_capacity(max_lines),
            max_lines,
            max_age,
            last_request: Instant::now(),
        }
    }

    /// Whether a row of `row_len` lines can join the pending request
    /// without pushing it past `max_lines`.
    ///
    /// An empty request accepts any row, so a row wider than `max_lines`
    /// still goes out whole in a request of its own.
    pub fn fits(&self, row_len: usize) -> bool {
        self.lines.is_empty() || self.lines.len() + row_len <= self.max_lines
    }

    /// Append one row's lines.
    ///
    /// Returns the request once it is full or overdue.
    pub fn push_row(&mut self, row: Vec<String>) -> Option<Vec<String>> {
        self.lines.extend(row);
        if self.lines.len() >= self.max_lines || self.is_overdue() {
            Some(self.take())
        } else {
            None
        }
    }

    /// True when lines have been waiting longer than `max_age`.
    pub fn is_overdue(&self) -> bool {
        !self.lines.is_empty() && self.last_request.elapsed() >= self.max_age
    }

    /// Hand out the pending request, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<String> {
        self.last_request = Instant::now();
        std::mem::replace(&mut self.lines, Vec::with_capacity(self.max_lines))
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    fn row(ts: u32, metrics: &[&str]) -> Vec<String> {
        metrics
            .iter()
            .map(|m| format!("°C,metric={} value=40 {}", m, ts))
            .collect()
    }

    #[test]
    fn test_request_released_when_full() {
        let mut buf = RequestBuffer::new(4, HOUR);

        assert!(buf.push_row(row(0, &["CPU", "GPU"])).is_none());
        assert_eq!(buf.len(), 2);

        let request = buf.push_row(row(10, &["CPU", "GPU"])).unwrap();
        assert_eq!(request.len(), 4);
        assert_eq!(request[3], "°C,metric=GPU value=40 10");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_fits_keeps_rows_whole() {
        let mut buf = RequestBuffer::new(3, HOUR);
        assert!(buf.push_row(row(0, &["CPU", "Fan1"])).is_none());

        // A second two-line row would need a request of four.
        assert!(!buf.fits(2));
        assert!(buf.fits(1));
    }

    #[test]
    fn test_wide_row_goes_out_alone() {
        let mut buf = RequestBuffer::new(2, HOUR);
        assert!(buf.fits(5));

        let request = buf.push_row(row(0, &["a", "b", "c", "d", "e"])).unwrap();
        assert_eq!(request.len(), 5);
    }

    #[test]
    fn test_overdue_request() {
        let mut buf = RequestBuffer::new(1000, Duration::ZERO);
        assert!(!buf.is_overdue());

        let request = buf.push_row(row(0, &["CPU"])).unwrap();
        assert_eq!(request, vec!["°C,metric=CPU value=40 0".to_string()]);
        assert!(!buf.is_overdue());
    }

    #[test]
    fn test_take_empties_buffer() {
        let mut buf = RequestBuffer::new(0, HOUR);
        assert_eq!(buf.max_lines(), 1);
        assert!(buf.take().is_empty());
    }
}
