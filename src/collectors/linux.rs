use std::fs;
use std::path::{Path, PathBuf};

use super::{MetricSource, SysinfoGauges, thermal};
use crate::error::MetricError;
use crate::model::DiskCounters;

/// Bytes per sector as reported by /proc/diskstats, independent of the device.
const SECTOR_SIZE: u64 = 512;

pub struct LinuxSource {
    gauges: SysinfoGauges,
    thermal_paths: Vec<PathBuf>,
}

impl LinuxSource {
    pub fn new(thermal_paths: Vec<PathBuf>) -> Self {
        Self {
            gauges: SysinfoGauges::new(),
            thermal_paths,
        }
    }
}

impl MetricSource for LinuxSource {
    fn read_cpu_percent(&mut self) -> Result<f64, MetricError> {
        self.gauges.cpu_percent()
    }

    fn read_memory_percent(&mut self) -> Result<f64, MetricError> {
        self.gauges.memory_percent()
    }

    fn read_disk_counters(&mut self) -> Result<DiskCounters, MetricError> {
        let content = fs::read_to_string("/proc/diskstats")
            .map_err(|e| MetricError::read_failure(format!("failed to read /proc/diskstats: {}", e)))?;
        Ok(parse_diskstats(&content, is_block_device))
    }

    fn read_cpu_temperature(&mut self) -> Result<Option<f64>, MetricError> {
        thermal::read_cpu_temperature(&self.thermal_paths)
    }
}

/// Sum read/written bytes over whole devices in /proc/diskstats content.
/// Partitions are skipped so their I/O is not counted twice.
pub fn parse_diskstats(content: &str, is_whole_device: impl Fn(&str) -> bool) -> DiskCounters {
    let mut totals = DiskCounters::default();
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        // Fields (0-indexed):
        //  2  name
        //  5  sectors read
        //  9  sectors written
        if parts.len() < 10 || !is_whole_device(parts[2]) {
            continue;
        }
        let read = parts[5].parse::<u64>().unwrap_or(0);
        let written = parts[9].parse::<u64>().unwrap_or(0);
        totals.read_bytes = totals.read_bytes.saturating_add(read.saturating_mul(SECTOR_SIZE));
        totals.write_bytes = totals.write_bytes.saturating_add(written.saturating_mul(SECTOR_SIZE));
    }
    totals
}

// ── block-device detection ──────────────────────────────────────────────

/// Return `true` if `name` looks like a whole block device rather than a
/// partition. Uses /sys/block/<name> when available, otherwise falls back
/// to name-pattern heuristics.
pub fn is_block_device(name: &str) -> bool {
    if Path::new(&format!("/sys/block/{}", name)).exists() {
        return true;
    }
    looks_like_whole_device(name)
}

/// Name heuristics for when /sys is unavailable (e.g. some containers).
fn looks_like_whole_device(name: &str) -> bool {
    let bytes = name.as_bytes();
    // sda, vda (SCSI/SATA, virtio; not sda1)
    if (name.starts_with("sd") || name.starts_with("vd")) && name.len() == 3 && bytes[2].is_ascii_alphabetic() {
        return true;
    }
    // xvda (Xen; not xvda1)
    if name.starts_with("xvd") && name.len() == 4 && bytes[3].is_ascii_alphabetic() {
        return true;
    }
    // nvme0n1, mmcblk0 (NVMe, SD/eMMC; not nvme0n1p1, mmcblk0p1)
    if (name.starts_with("nvme") || name.starts_with("mmcblk")) && !name[4..].contains('p') {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISKSTATS: &str = "\
 179       0 mmcblk0 5000 10 8000 900 700 20 4000 300 0 1200 1200 0 0 0 0
 179       1 mmcblk0p1 100 0 200 10 5 0 16 2 0 12 12 0 0 0 0
 179       2 mmcblk0p2 4900 10 7800 890 695 20 3984 298 0 1188 1188 0 0 0 0
 259       0 nvme0n1 200 0 100 50 10 0 20 5 0 60 55 0 0 0 0
   7       0 loop0 30 0 60 1 0 0 0 0 0 4 1 0 0 0 0
";

    #[test]
    fn sums_whole_devices_only() {
        let totals = parse_diskstats(DISKSTATS, looks_like_whole_device);
        assert_eq!(totals.read_bytes, (8000 + 100) * 512);
        assert_eq!(totals.write_bytes, (4000 + 20) * 512);
    }

    #[test]
    fn short_lines_are_ignored() {
        let totals = parse_diskstats("8 0 sda 1 2\n", |_| true);
        assert_eq!(totals, DiskCounters::default());
    }

    #[test]
    fn device_name_heuristics() {
        assert!(looks_like_whole_device("sda"));
        assert!(!looks_like_whole_device("sda1"));
        assert!(looks_like_whole_device("vdb"));
        assert!(looks_like_whole_device("xvda"));
        assert!(!looks_like_whole_device("xvda1"));
        assert!(looks_like_whole_device("nvme0n1"));
        assert!(!looks_like_whole_device("nvme0n1p1"));
        assert!(looks_like_whole_device("mmcblk0"));
        assert!(!looks_like_whole_device("mmcblk0p2"));
        assert!(!looks_like_whole_device("loop0"));
    }
}
