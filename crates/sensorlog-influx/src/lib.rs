// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! InfluxDB adapter for sensorlog.
//!
//! This crate provides:
//! - InfluxDB Line Protocol encoding of sensorlog points
//! - Batching with size and time-based flushing
//! - A [`TimeSeriesStore`] seam with an InfluxDB 1.x HTTP implementation
//! - Watermark resolution (`LAST(value)` per unit series for a host)
//!
//! # Overview
//!
//! ```text
//! Point --> encode_point --> RequestBuffer --> TimeSeriesStore::write_batch
//! TimeSeriesStore::query --> resolve_watermark --> Watermark
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod influx;
pub mod store;
pub mod watermark;
pub mod writer;

pub use client::InfluxClient;
pub use config::InfluxDbConfig;
pub use store::{MemoryStore, Series, StoreError, TimeSeriesStore};
pub use watermark::resolve_watermark;
pub use writer::{StoreWriter, WriteStats};
