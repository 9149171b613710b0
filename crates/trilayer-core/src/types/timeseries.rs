//! Time-stamped property samples attached to Form elements.

use super::TrilayerError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse an ISO-8601 timestamp.
///
/// Offsets are accepted and converted to UTC; naive date-times and bare dates
/// (midnight) are taken as-is.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, TrilayerError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_utc());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TrilayerError::InvalidTimestamp(raw.to_string()))
}

/// Format a timestamp the way the interchange format stores it.
#[must_use]
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Coerce a sample to `f64`.
///
/// Numbers, numeric strings and booleans coerce; everything else is `None`.
#[must_use]
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

// =============================================================================
// TIME SERIES DATA
// =============================================================================

/// Named, timestamped value sequences of one Form element.
///
/// Append-only. The timestamp list is shared by every property and holds each
/// distinct timestamp once, in arrival order; sample `i` of a property lines
/// up with `timestamps[i]` when the property was sampled at every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimeSeriesRecord", into = "TimeSeriesRecord")]
pub struct TimeSeriesData {
    timestamps: Vec<NaiveDateTime>,
    values: BTreeMap<String, Vec<Value>>,
}

impl TimeSeriesData {
    /// Create an empty series block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample. A timestamp already present is not repeated.
    pub fn add(&mut self, timestamp: NaiveDateTime, property: &str, value: impl Into<Value>) {
        self.values
            .entry(property.to_string())
            .or_default()
            .push(value.into());
        if !self.timestamps.contains(&timestamp) {
            self.timestamps.push(timestamp);
        }
    }

    /// All distinct timestamps in arrival order.
    #[must_use]
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Timestamp at a sample index, if one was recorded.
    #[must_use]
    pub fn timestamp_at(&self, index: usize) -> Option<&NaiveDateTime> {
        self.timestamps.get(index)
    }

    /// Raw samples of one property.
    #[must_use]
    pub fn values(&self, property: &str) -> Option<&[Value]> {
        self.values.get(property).map(Vec::as_slice)
    }

    /// Iterate properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Most recent sample of a property.
    #[must_use]
    pub fn latest(&self, property: &str) -> Option<&Value> {
        self.values.get(property).and_then(|v| v.last())
    }

    /// Samples whose timestamp lies in the closed interval `[start, end]`.
    #[must_use]
    pub fn range(&self, property: &str, start: NaiveDateTime, end: NaiveDateTime) -> Vec<&Value> {
        let Some(samples) = self.values.get(property) else {
            return Vec::new();
        };
        self.timestamps
            .iter()
            .zip(samples)
            .filter(|(ts, _)| **ts >= start && **ts <= end)
            .map(|(_, v)| v)
            .collect()
    }

    /// Numeric view of a property.
    ///
    /// `None` when the property is missing or any sample fails coercion.
    #[must_use]
    pub fn numeric_series(&self, property: &str) -> Option<Vec<f64>> {
        self.values
            .get(property)?
            .iter()
            .map(coerce_numeric)
            .collect()
    }

    /// True when no sample was ever recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.values().all(Vec::is_empty)
    }
}

// =============================================================================
// WIRE RECORD
// =============================================================================

/// Interchange shape: timestamps as ISO-8601 strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TimeSeriesRecord {
    #[serde(default)]
    timestamps: Vec<String>,
    #[serde(default)]
    values: BTreeMap<String, Vec<Value>>,
}

impl TryFrom<TimeSeriesRecord> for TimeSeriesData {
    type Error = TrilayerError;

    fn try_from(record: TimeSeriesRecord) -> Result<Self, Self::Error> {
        let timestamps = record
            .timestamps
            .iter()
            .map(|raw| parse_timestamp(raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            timestamps,
            values: record.values,
        })
    }
}

impl From<TimeSeriesData> for TimeSeriesRecord {
    fn from(data: TimeSeriesData) -> Self {
        Self {
            timestamps: data.timestamps.iter().map(format_timestamp).collect(),
            values: data.values,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
