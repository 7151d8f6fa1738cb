use sysinfo::System;

use crate::config::Config;
use crate::error::MetricError;
use crate::model::DiskCounters;

pub mod linux;
pub mod mac;
pub mod thermal;

/// Source of instantaneous OS metrics. Implementations (LinuxSource, MacSource)
/// handle the platform details; the Sampler owns one and turns counters into rates.
pub trait MetricSource {
    /// Point-in-time CPU utilization in [0, 100].
    fn read_cpu_percent(&mut self) -> Result<f64, MetricError>;

    /// Point-in-time memory utilization in [0, 100].
    fn read_memory_percent(&mut self) -> Result<f64, MetricError>;

    /// Cumulative disk I/O byte totals; the caller computes rates.
    fn read_disk_counters(&mut self) -> Result<DiskCounters, MetricError>;

    /// CPU package temperature in °C. `Ok(None)` when no sensor exists.
    fn read_cpu_temperature(&mut self) -> Result<Option<f64>, MetricError>;
}

/// Pick the collector for the running OS.
pub fn default_source(config: &Config) -> Box<dyn MetricSource + Send> {
    if cfg!(target_os = "macos") {
        Box::new(mac::MacSource::new(config.thermal_paths.clone()))
    } else {
        Box::new(linux::LinuxSource::new(config.thermal_paths.clone()))
    }
}

impl<S: MetricSource + ?Sized> MetricSource for Box<S> {
    fn read_cpu_percent(&mut self) -> Result<f64, MetricError> {
        (**self).read_cpu_percent()
    }

    fn read_memory_percent(&mut self) -> Result<f64, MetricError> {
        (**self).read_memory_percent()
    }

    fn read_disk_counters(&mut self) -> Result<DiskCounters, MetricError> {
        (**self).read_disk_counters()
    }

    fn read_cpu_temperature(&mut self) -> Result<Option<f64>, MetricError> {
        (**self).read_cpu_temperature()
    }
}

/// CPU and memory gauges shared by every platform, backed by sysinfo.
pub struct SysinfoGauges {
    sys: System,
}

impl SysinfoGauges {
    pub fn new() -> Self {
        let mut sys = System::new();
        // CPU usage is a delta between refreshes, so prime it once.
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        Self { sys }
    }

    pub fn system_mut(&mut self) -> &mut System {
        &mut self.sys
    }

    pub fn cpu_percent(&mut self) -> Result<f64, MetricError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(MetricError::read_failure("CPU usage is not supported on this OS"));
        }
        self.sys.refresh_cpu_usage();
        if self.sys.cpus().is_empty() {
            return Err(MetricError::read_failure("no CPU information available"));
        }
        Ok(f64::from(self.sys.global_cpu_usage()).clamp(0.0, 100.0))
    }

    pub fn memory_percent(&mut self) -> Result<f64, MetricError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(MetricError::read_failure("total memory reported as zero"));
        }
        let used = self.sys.used_memory();
        Ok((used as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
    }
}

impl Default for SysinfoGauges {
    fn default() -> Self {
        Self::new()
    }
}
