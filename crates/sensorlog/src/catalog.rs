// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 sensorlog contributors

//! Typed metric catalog.
//!
//! Turns parsed sensor blocks into [`Metric`] records and the ordered column
//! header of the CSV logs. When a log has no header row the catalog header is
//! applied positionally, so its order must follow the block order exactly.

use crate::point::Value;
use crate::sensors::{AttrValue, SensorBlock};
use chrono::{FixedOffset, Local};
use std::collections::HashMap;
use thiserror::Error;

/// Name of the first log column (seconds elapsed since the file's base date).
pub const ELAPSED_COLUMN: &str = "Seconds";

/// Every measurement name a SpeedFan import may have written.
pub const SERIES_NAMES: [&str; 5] = ["°C", "°F", "RPM", "%", "V"];

/// Catalog construction errors. All of them abort the run before ingestion.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown metric kind {0:?}")]
    UnknownMetricKind(String),

    #[error("sensor {kind} {index} from {source_name} has no `{key}` attribute")]
    MissingAttribute {
        kind: String,
        index: i64,
        source_name: String,
        key: &'static str,
    },

    #[error("metric {metric:?}: attribute `{key}` has unexpected value {value:?}")]
    InvalidAttribute {
        metric: String,
        key: &'static str,
        value: String,
    },

    #[error("metric {0:?} is defined more than once")]
    DuplicateMetric(String),
}

/// Temperature unit selected in SpeedFan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempUnits {
    Celsius,
    Fahrenheit,
}

impl TempUnits {
    pub fn from_use_celsius(use_celsius: bool) -> Self {
        if use_celsius {
            TempUnits::Celsius
        } else {
            TempUnits::Fahrenheit
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TempUnits::Celsius => "°C",
            TempUnits::Fahrenheit => "°F",
        }
    }
}

/// Telemetry category of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Temperature,
    Pwm,
    Fan,
    Voltage,
}

impl MetricKind {
    /// Exact-match lookup of the label used in sensor block headers.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Temp" => Some(MetricKind::Temperature),
            "Pwm" => Some(MetricKind::Pwm),
            "Fan" => Some(MetricKind::Fan),
            "Volt" => Some(MetricKind::Voltage),
            _ => None,
        }
    }

    /// Unit label, which is also the measurement name in the store.
    pub fn units(self, temp_units: TempUnits) -> &'static str {
        match self {
            MetricKind::Temperature => temp_units.label(),
            MetricKind::Pwm => "%",
            MetricKind::Fan => "RPM",
            MetricKind::Voltage => "V",
        }
    }

    /// Name of the value type, for diagnostics.
    pub fn value_type(self) -> &'static str {
        match self {
            MetricKind::Fan => "integer",
            _ => "float",
        }
    }
}

/// Kind-specific attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum KindAttrs {
    Temperature {
        wanted: Option<i64>,
        warning: Option<i64>,
        offset: i64,
        used_pwms: i64,
    },
    Pwm {
        minimum: i64,
        maximum: i64,
        variate: bool,
    },
    Fan,
    Voltage,
}

/// A sensor that is both active and logged.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    source: String,
    index: i64,
    units: &'static str,
    attrs: KindAttrs,
    tags: Vec<(&'static str, String)>,
}

impl Metric {
    fn new(
        name: String,
        source: String,
        index: i64,
        units: &'static str,
        attrs: KindAttrs,
        hostname: &str,
    ) -> Self {
        let mut tags = vec![
            ("metric", name.clone()),
            ("chipset", source.clone()),
            ("index", index.to_string()),
            ("host", hostname.to_string()),
        ];
        match &attrs {
            KindAttrs::Temperature {
                wanted,
                warning,
                offset,
                used_pwms,
            } => {
                if let Some(w) = wanted {
                    tags.push(("wanted", w.to_string()));
                }
                if let Some(w) = warning {
                    tags.push(("warning", w.to_string()));
                }
                tags.push(("offset", offset.to_string()));
                tags.push(("used_pwms", used_pwms.to_string()));
            }
            KindAttrs::Pwm {
                minimum,
                maximum,
                variate,
            } => {
                tags.push(("minimum", minimum.to_string()));
                tags.push(("maximum", maximum.to_string()));
                tags.push(("variate", variate.to_string()));
            }
            KindAttrs::Fan | KindAttrs::Voltage => {}
        }

        Self {
            name,
            source,
            index,
            units,
            attrs,
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn units(&self) -> &'static str {
        self.units
    }

    pub fn attrs(&self) -> &KindAttrs {
        &self.attrs
    }

    pub fn kind(&self) -> MetricKind {
        match self.attrs {
            KindAttrs::Temperature { .. } => MetricKind::Temperature,
            KindAttrs::Pwm { .. } => MetricKind::Pwm,
            KindAttrs::Fan => MetricKind::Fan,
            KindAttrs::Voltage => MetricKind::Voltage,
        }
    }

    /// Static tag set (metric attributes plus `host`).
    pub fn tags(&self) -> &[(&'static str, String)] {
        &self.tags
    }

    /// Convert a raw log cell into this metric's value type.
    ///
    /// Fans are integers, everything else is a float. Non-finite floats are
    /// rejected since the store cannot hold them.
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self.kind() {
            MetricKind::Fan => raw.parse::<i64>().ok().map(Value::Integer),
            _ => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Float),
        }
    }
}

/// Active, logged metrics and the column layout of the logs.
#[derive(Debug, Clone)]
pub struct Catalog {
    header: Vec<String>,
    metrics: HashMap<String, Metric>,
    temp_units: TempUnits,
    offset: FixedOffset,
}

impl Catalog {
    /// Build the catalog, capturing the local UTC offset for log timestamps.
    pub fn build(
        blocks: &[SensorBlock],
        temp_units: TempUnits,
        hostname: &str,
    ) -> Result<Self, CatalogError> {
        let offset = *Local::now().offset();
        Self::build_with_offset(blocks, temp_units, hostname, offset)
    }

    /// Build the catalog with an explicit UTC offset for log timestamps.
    pub fn build_with_offset(
        blocks: &[SensorBlock],
        temp_units: TempUnits,
        hostname: &str,
        offset: FixedOffset,
    ) -> Result<Self, CatalogError> {
        let mut header = vec![ELAPSED_COLUMN.to_string()];
        let mut metrics = HashMap::new();

        for block in blocks.iter().filter(|b| b.is_logged()) {
            let kind = MetricKind::from_label(&block.kind_label)
                .ok_or_else(|| CatalogError::UnknownMetricKind(block.kind_label.clone()))?;

            let name = block
                .attr("name")
                .map(AttrValue::to_string)
                .ok_or_else(|| CatalogError::MissingAttribute {
                    kind: block.kind_label.clone(),
                    index: block.index,
                    source_name: block.source.clone(),
                    key: "name",
                })?;

            if metrics.contains_key(&name) {
                return Err(CatalogError::DuplicateMetric(name));
            }

            let attrs = kind_attrs(kind, block, &name)?;
            let metric = Metric::new(
                name.clone(),
                block.source.clone(),
                block.index,
                kind.units(temp_units),
                attrs,
                hostname,
            );

            header.push(name.clone());
            metrics.insert(name, metric);
        }

        Ok(Self {
            header,
            metrics,
            temp_units,
            offset,
        })
    }

    /// Column names in log order, starting with [`ELAPSED_COLUMN`].
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// Metrics in header order.
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.header[1..].iter().filter_map(|name| self.metrics.get(name))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn temp_units(&self) -> TempUnits {
        self.temp_units
    }

    /// UTC offset the log base dates are interpreted in.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

fn kind_attrs(kind: MetricKind, block: &SensorBlock, name: &str) -> Result<KindAttrs, CatalogError> {
    let int = |key: &'static str| -> Result<Option<i64>, CatalogError> {
        match block.attr(config_key(key)) {
            None => Ok(None),
            Some(v) => v.as_int().map(Some).ok_or_else(|| CatalogError::InvalidAttribute {
                metric: name.to_string(),
                key,
                value: v.to_string(),
            }),
        }
    };

    Ok(match kind {
        MetricKind::Temperature => KindAttrs::Temperature {
            wanted: int("wanted")?,
            warning: int("warning")?,
            offset: int("offset")?.unwrap_or(0),
            used_pwms: int("used_pwms")?.unwrap_or(0),
        },
        MetricKind::Pwm => {
            let variate = match block.attr("variate") {
                None => false,
                Some(v) => v.as_bool().ok_or_else(|| CatalogError::InvalidAttribute {
                    metric: name.to_string(),
                    key: "variate",
                    value: v.to_string(),
                })?,
            };
            KindAttrs::Pwm {
                minimum: int("minimum")?.unwrap_or(0),
                maximum: int("maximum")?.unwrap_or(100),
                variate,
            }
        }
        MetricKind::Fan => KindAttrs::Fan,
        MetricKind::Voltage => KindAttrs::Voltage,
    })
}

/// Attribute key as spelled in `speedfansens.cfg`.
fn config_key(key: &'static str) -> &'static str {
    match key {
        "used_pwms" => "UsedPwms",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::parse_block;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn blocks(sources: &[&str]) -> Vec<SensorBlock> {
        sources.iter().map(|s| parse_block(s).unwrap()).collect()
    }

    const CPU: &str = "Temp 0 from Core\nactive=true\nlogged=true\nname=CPU\nwanted=50\nwarning=80\noffset=0\nUsedPwms=1";

    #[test]
    fn test_cpu_temperature_metric() {
        let catalog = Catalog::build_with_offset(&blocks(&[CPU]), TempUnits::Celsius, "rig", utc())
            .expect("build catalog");

        assert_eq!(catalog.header(), &["Seconds", "CPU"]);
        let cpu = catalog.metric("CPU").expect("CPU metric");
        assert_eq!(cpu.kind(), MetricKind::Temperature);
        assert_eq!(cpu.units(), "°C");
        assert_eq!(cpu.source(), "Core");
        assert_eq!(cpu.index(), 0);
        assert_eq!(
            cpu.attrs(),
            &KindAttrs::Temperature {
                wanted: Some(50),
                warning: Some(80),
                offset: 0,
                used_pwms: 1,
            }
        );
        assert!(cpu.tags().contains(&("metric", "CPU".to_string())));
        assert!(cpu.tags().contains(&("host", "rig".to_string())));
        assert!(cpu.tags().contains(&("used_pwms", "1".to_string())));
    }

    #[test]
    fn test_header_follows_block_order_and_skips_unlogged() {
        let catalog = Catalog::build_with_offset(
            &blocks(&[
                "Fan 0 from Board\nactive=true\nlogged=true\nname=Fan1",
                "Volt 0 from Board\nactive=true\nlogged=false\nname=Vcore",
                "Pwm 1 from Board\nactive=1\nlogged=true\nname=PWM2",
                "Temp 3 from Disk\nactive=false\nlogged=true\nname=HD0",
                "Volt 1 from Board\nactive=true\nlogged=true\nname=+12V",
            ]),
            TempUnits::Fahrenheit,
            "rig",
            utc(),
        )
        .unwrap();

        assert_eq!(catalog.header(), &["Seconds", "Fan1", "PWM2", "+12V"]);
        assert_eq!(catalog.len(), 3);
        let names: Vec<_> = catalog.metrics().map(Metric::name).collect();
        assert_eq!(names, vec!["Fan1", "PWM2", "+12V"]);
        assert_eq!(catalog.metric("Fan1").unwrap().units(), "RPM");
        assert_eq!(catalog.metric("+12V").unwrap().units(), "V");
        assert!(catalog.metric("Vcore").is_none());
    }

    #[test]
    fn test_pwm_defaults() {
        let catalog = Catalog::build_with_offset(
            &blocks(&["Pwm 0 from Board\nactive=true\nlogged=true\nname=PWM1"]),
            TempUnits::Celsius,
            "rig",
            utc(),
        )
        .unwrap();
        let pwm = catalog.metric("PWM1").unwrap();
        assert_eq!(pwm.units(), "%");
        assert_eq!(
            pwm.attrs(),
            &KindAttrs::Pwm {
                minimum: 0,
                maximum: 100,
                variate: false,
            }
        );
        assert!(pwm.tags().contains(&("variate", "false".to_string())));
    }

    #[test]
    fn test_temperature_defaults() {
        let catalog = Catalog::build_with_offset(
            &blocks(&["Temp 1 from Core\nactive=true\nlogged=true\nname=Core1"]),
            TempUnits::Fahrenheit,
            "rig",
            utc(),
        )
        .unwrap();
        let core = catalog.metric("Core1").unwrap();
        assert_eq!(core.units(), "°F");
        assert_eq!(
            core.attrs(),
            &KindAttrs::Temperature {
                wanted: None,
                warning: None,
                offset: 0,
                used_pwms: 0,
            }
        );
        assert!(!core.tags().iter().any(|(k, _)| *k == "wanted"));
    }

    #[test]
    fn test_unknown_kind_fails_only_when_logged() {
        let skipped = blocks(&["Amp 0 from Board\nactive=false\nlogged=true\nname=I"]);
        assert!(Catalog::build_with_offset(&skipped, TempUnits::Celsius, "rig", utc()).is_ok());

        let logged = blocks(&["Amp 0 from Board\nactive=true\nlogged=true\nname=I"]);
        assert_eq!(
            Catalog::build_with_offset(&logged, TempUnits::Celsius, "rig", utc()).unwrap_err(),
            CatalogError::UnknownMetricKind("Amp".to_string())
        );
    }

    #[test]
    fn test_duplicate_name() {
        let dup = blocks(&[
            "Fan 0 from Board\nactive=true\nlogged=true\nname=Fan",
            "Fan 1 from Board\nactive=true\nlogged=true\nname=Fan",
        ]);
        assert_eq!(
            Catalog::build_with_offset(&dup, TempUnits::Celsius, "rig", utc()).unwrap_err(),
            CatalogError::DuplicateMetric("Fan".to_string())
        );
    }

    #[test]
    fn test_missing_name_and_invalid_attribute() {
        let nameless = blocks(&["Fan 0 from Board\nactive=true\nlogged=true"]);
        assert!(matches!(
            Catalog::build_with_offset(&nameless, TempUnits::Celsius, "rig", utc()),
            Err(CatalogError::MissingAttribute { key: "name", .. })
        ));

        let bad = blocks(&["Pwm 0 from Board\nactive=true\nlogged=true\nname=P\nmaximum=lots"]);
        assert_eq!(
            Catalog::build_with_offset(&bad, TempUnits::Celsius, "rig", utc()).unwrap_err(),
            CatalogError::InvalidAttribute {
                metric: "P".to_string(),
                key: "maximum",
                value: "lots".to_string(),
            }
        );
    }

    #[test]
    fn test_coerce_by_kind() {
        let catalog = Catalog::build_with_offset(
            &blocks(&[
                "Fan 0 from Board\nactive=true\nlogged=true\nname=Fan1",
                "Volt 0 from Board\nactive=true\nlogged=true\nname=Vcore",
            ]),
            TempUnits::Celsius,
            "rig",
            utc(),
        )
        .unwrap();

        let fan = catalog.metric("Fan1").unwrap();
        assert_eq!(fan.coerce("1234"), Some(Value::Integer(1234)));
        assert_eq!(fan.coerce("1234.5"), None);

        let volt = catalog.metric("Vcore").unwrap();
        assert_eq!(volt.coerce(" 1.25 "), Some(Value::Float(1.25)));
        assert_eq!(volt.coerce("12"), Some(Value::Float(12.0)));
        assert_eq!(volt.coerce("n/a"), None);
        assert_eq!(volt.coerce("NaN"), None);
        assert_eq!(volt.coerce(""), None);
    }
}
