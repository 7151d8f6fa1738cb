use serde::Serialize;

use crate::error::MetricError;

/// One field of a sample. Failures are carried per field so a bad reading
/// never hides the others.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading {
    Ok(f64),
    /// No sensor exists for this field (rendered as N/A)
    Unavailable,
    /// The sensor produced something that is not a number
    Invalid(String),
    /// The OS call failed
    Failed(String),
}

impl Reading {
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Ok(v) => Some(*v),
            _ => None,
        }
    }

    /// Failed and missing readings count as zero for bars and rates.
    pub fn or_zero(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }
}

impl From<MetricError> for Reading {
    fn from(err: MetricError) -> Self {
        match err {
            MetricError::SensorInvalid { raw, .. } => Reading::Invalid(raw),
            MetricError::ReadFailure(msg) => Reading::Failed(msg),
        }
    }
}

/// Cumulative disk I/O totals since boot (or since the counters last reset).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiskCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Produced once per tick; immutable after creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricSample {
    /// Local wall-clock time of the tick, `HH:MM:SS`
    pub time: String,
    pub cpu_percent: Reading,
    pub memory_percent: Reading,
    pub cpu_temperature_celsius: Reading,
    pub disk_read_rate_kb_per_s: Reading,
    pub disk_write_rate_kb_per_s: Reading,
}
