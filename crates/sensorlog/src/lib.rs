// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! SpeedFan sensor catalog and incremental log ingestion.
//!
//! This crate provides:
//! - Parsing of `speedfanparams.cfg` (global options such as temperature units)
//! - Parsing of the `speedfansens.cfg` block dialect into attribute maps
//! - A typed metric catalog matching the column layout of the CSV logs
//! - Lazy, watermark-filtered ingestion of `SFLog*.csv` files into points
//!
//! # Overview
//!
//! The crate does NOT talk to a database. Resolving the watermark and writing
//! points is the job of `sensorlog-influx`.
//!
//! ```text
//! speedfansens.cfg --> parse_sensors --> Catalog --+
//!                                                  +--> LogIngestor --> Point stream
//! store (last value per host) --> Watermark -------+
//! ```

pub mod catalog;
pub mod ingest;
pub mod logfile;
pub mod params;
pub mod point;
pub mod sensors;
pub mod watermark;

pub use catalog::{Catalog, CatalogError, KindAttrs, Metric, MetricKind, TempUnits, SERIES_NAMES};
pub use ingest::{CellCoercionError, CoercionPolicy, IngestError, IngestOptions, IngestStats, LogIngestor, PointStream};
pub use params::{ParamsError, SpeedFanParams};
pub use point::{Point, Value};
pub use sensors::{parse_sensors, AttrValue, ParseError, SensorBlock};
pub use watermark::Watermark;
