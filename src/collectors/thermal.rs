//! CPU package temperature from firmware-exposed thermal zone files.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::MetricError;

/// Probe `paths` in order and return the first existing sensor's value in °C.
///
/// Sensor files hold an integer in millidegrees Celsius. Returns `Ok(None)`
/// when none of the paths exist, and `SensorInvalid` when the first existing
/// file does not parse; later paths are not consulted in that case.
pub fn read_cpu_temperature(paths: &[PathBuf]) -> Result<Option<f64>, MetricError> {
    for path in paths {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(MetricError::read_failure(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let trimmed = raw.trim();
        return match trimmed.parse::<i64>() {
            Ok(millidegrees) => Ok(Some(millidegrees as f64 / 1000.0)),
            Err(_) => Err(MetricError::SensorInvalid {
                path: path.clone(),
                raw: trimmed.to_string(),
            }),
        };
    }
    Ok(None)
}
