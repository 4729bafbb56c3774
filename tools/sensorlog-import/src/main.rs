// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! sensorlog-import CLI
//!
//! Import SpeedFan sensor logs into InfluxDB. Each run resumes after the
//! newest point already stored for the host, so it can be scheduled freely.
//!
//! # Usage
//!
//! ```bash
//! # Import using ./sensorlog.toml
//! sensorlog-import
//!
//! # Explicit directory and host tag
//! sensorlog-import --dir "C:/Program Files (x86)/SpeedFan" --host rig
//!
//! # Print line protocol instead of writing, starting from scratch
//! sensorlog-import --dry-run --full
//!
//! # Show how many points each metric produced
//! sensorlog-import --counts
//! ```

mod config;
mod hostname;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::ImporterConfig;
use sensorlog::params::SENSORS_FILE;
use sensorlog::{
    parse_sensors, Catalog, CoercionPolicy, IngestOptions, IngestStats, LogIngestor,
    SpeedFanParams, Watermark, SERIES_NAMES,
};
use sensorlog_influx::{
    resolve_watermark, InfluxClient, InfluxDbConfig, Series, StoreError, StoreWriter,
    TimeSeriesStore, WriteStats,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "sensorlog-import")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Import SpeedFan sensor logs into InfluxDB without duplicating points")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file [default: ./sensorlog.toml when present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SpeedFan directory (speedfanparams.cfg, speedfansens.cfg, SFLog*.csv)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Value of the host tag [default: machine hostname]
    #[arg(long)]
    host: Option<String>,

    /// Abort on the first cell that does not parse
    #[arg(long)]
    strict: bool,

    /// Points per write request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Print line protocol to stdout instead of writing to the store
    #[arg(long)]
    dry_run: bool,

    /// Ignore stored points and import every log row
    #[arg(long)]
    full: bool,

    /// Print the number of points per metric
    #[arg(long)]
    counts: bool,

    /// Verbose mode (debug logs)
    #[arg(short, long)]
    verbose: bool,
}

/// Effective settings after merging the config file and the command line.
#[derive(Debug)]
struct Settings {
    dir: PathBuf,
    host: String,
    batch_size: usize,
    strict: bool,
    influxdb: InfluxDbConfig,
}

impl Settings {
    fn resolve(cli: &Cli, config: ImporterConfig) -> Result<Self> {
        let dir = match cli.dir.clone().or(config.import.speedfan_dir) {
            Some(dir) => dir,
            None => bail!("no SpeedFan directory: pass --dir or set import.speedfan_dir"),
        };
        let host = match cli.host.clone().or(config.import.hostname) {
            Some(host) => host,
            None => hostname::get().context("Failed to determine hostname, pass --host")?,
        };
        let batch_size = cli.batch_size.unwrap_or(config.import.batch_size);
        if batch_size == 0 {
            bail!("--batch-size must be at least 1");
        }

        Ok(Self {
            dir,
            host,
            batch_size,
            strict: cli.strict || config.import.strict,
            influxdb: config.influxdb,
        })
    }
}

/// Dry-run sink: prints each line instead of storing it.
struct StdoutStore;

impl TimeSeriesStore for StdoutStore {
    fn query(&self, _: &str, _: &[(&str, &str)]) -> Result<Vec<Series>, StoreError> {
        Ok(Vec::new())
    }

    fn write_batch(&self, lines: &[String]) -> Result<(), StoreError> {
        let mut out = std::io::stdout().lock();
        for line in lines {
            writeln!(out, "{}", line).map_err(|e| StoreError::Unreachable(e.to_string()))?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "sensorlog=debug"
    } else {
        "sensorlog=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ImporterConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let settings = Settings::resolve(&cli, config)?;

    tracing::info!(
        dir = %settings.dir.display(),
        host = %settings.host,
        dry_run = cli.dry_run,
        "Starting import"
    );

    let (catalog, options) = load_catalog(&settings)?;
    println!("{}", catalog.header().join("\t"));

    // Only a dry run that also skips the watermark can do without a store.
    let client = if cli.dry_run && cli.full {
        None
    } else {
        Some(InfluxClient::new(&settings.influxdb).context("Failed to create InfluxDB client")?)
    };

    let watermark = match &client {
        Some(client) if !cli.full => resolve_watermark(client, &settings.host, &SERIES_NAMES)
            .context("Failed to resolve watermark")?,
        _ => Watermark::EPOCH,
    };

    let sink: &dyn TimeSeriesStore = match &client {
        Some(client) if !cli.dry_run => client as &dyn TimeSeriesStore,
        _ => &StdoutStore,
    };

    let (ingest, written) = import(
        &catalog,
        options,
        &settings.dir,
        watermark,
        sink,
        settings.batch_size,
    )?;

    tracing::info!(
        files = ingest.files_read,
        files_skipped = ingest.files_skipped,
        rows = ingest.rows_read,
        rows_skipped = ingest.rows_skipped,
        "Import finished: {}",
        written
    );

    if cli.counts {
        print_counts(&catalog, &ingest);
    }
    if ingest.cell_errors > 0 {
        tracing::warn!(
            cell_errors = ingest.cell_errors,
            "Some cells could not be parsed and were skipped"
        );
    }

    Ok(())
}

/// Read the SpeedFan configuration of `settings.dir`.
fn load_catalog(settings: &Settings) -> Result<(Catalog, IngestOptions)> {
    let dir = &settings.dir;
    let params = SpeedFanParams::load(dir).context("Failed to read SpeedFan parameters")?;

    let sensors_path = dir.join(SENSORS_FILE);
    let text = std::fs::read_to_string(&sensors_path)
        .with_context(|| format!("Failed to read {}", sensors_path.display()))?;
    let blocks = parse_sensors(&text)
        .with_context(|| format!("Failed to parse {}", sensors_path.display()))?;

    let catalog = Catalog::build(&blocks, params.temp_units()?, &settings.host)
        .context("Failed to build metric catalog")?;
    if catalog.is_empty() {
        tracing::warn!("No active logged sensors configured");
    }

    let options = IngestOptions {
        has_header_row: params.log_has_header()?,
        coercion: if settings.strict {
            CoercionPolicy::Abort
        } else {
            CoercionPolicy::Skip
        },
    };
    Ok((catalog, options))
}

/// Stream the logs of `dir` past `watermark` into `store`.
fn import(
    catalog: &Catalog,
    options: IngestOptions,
    dir: &Path,
    watermark: Watermark,
    store: &dyn TimeSeriesStore,
    batch_size: usize,
) -> Result<(IngestStats, WriteStats)> {
    let ingestor = LogIngestor::new(catalog, watermark, options);
    let mut points = ingestor.ingest(dir)?;
    let mut writer = StoreWriter::new(store, batch_size);

    for point in points.by_ref() {
        let point = match point {
            Ok(point) => point,
            Err(err) => {
                // The failing row's points were never yielded, so the writer
                // only holds complete rows.
                if let Err(flush_err) = writer.flush() {
                    tracing::warn!(error = %flush_err, "Could not write rows read before the error");
                }
                return Err(err).context("Import aborted");
            }
        };
        writer.write(&point).context("Failed to write points")?;
    }

    let written = writer.finish().context("Failed to write points")?;
    Ok((points.into_stats(), written))
}

fn print_counts(catalog: &Catalog, stats: &IngestStats) {
    let width = catalog
        .metrics()
        .map(|m| m.name().len())
        .max()
        .unwrap_or(0)
        .max("metric".len());

    println!("{:<width$}  {:>8}  units", "metric", "points");
    for metric in catalog.metrics() {
        let count = stats.per_metric.get(metric.name()).copied().unwrap_or(0);
        println!("{:<width$}  {:>8}  {}", metric.name(), count, metric.units());
    }
}
