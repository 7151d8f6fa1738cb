use std::path::PathBuf;

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate};

use super::{MetricSource, SysinfoGauges, thermal};
use crate::error::MetricError;
use crate::model::DiskCounters;

/// macOS has no /proc/diskstats; disk totals are the sum of per-process
/// lifetime disk usage. Processes exiting make the sum drop, which the
/// Sampler treats as a counter reset.
pub struct MacSource {
    gauges: SysinfoGauges,
    thermal_paths: Vec<PathBuf>,
}

impl MacSource {
    pub fn new(thermal_paths: Vec<PathBuf>) -> Self {
        Self {
            gauges: SysinfoGauges::new(),
            thermal_paths,
        }
    }
}

impl MetricSource for MacSource {
    fn read_cpu_percent(&mut self) -> Result<f64, MetricError> {
        self.gauges.cpu_percent()
    }

    fn read_memory_percent(&mut self) -> Result<f64, MetricError> {
        self.gauges.memory_percent()
    }

    fn read_disk_counters(&mut self) -> Result<DiskCounters, MetricError> {
        let sys = self.gauges.system_mut();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_disk_usage(),
        );
        if sys.processes().is_empty() {
            return Err(MetricError::read_failure("no process information available"));
        }

        let mut totals = DiskCounters::default();
        for process in sys.processes().values() {
            let usage = process.disk_usage();
            totals.read_bytes = totals.read_bytes.saturating_add(usage.total_read_bytes);
            totals.write_bytes = totals.write_bytes.saturating_add(usage.total_written_bytes);
        }
        Ok(totals)
    }

    fn read_cpu_temperature(&mut self) -> Result<Option<f64>, MetricError> {
        thermal::read_cpu_temperature(&self.thermal_paths)
    }
}
