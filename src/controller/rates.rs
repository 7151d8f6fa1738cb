//! Rate derivation from cumulative counters.

use std::time::{Duration, Instant};

/// Seconds between two captures. A non-positive span (clock went backwards
/// or two captures in the same instant) falls back to the nominal period.
pub fn elapsed_secs(now: Instant, previous: Instant, nominal: Duration) -> f64 {
    let secs = now.saturating_duration_since(previous).as_secs_f64();
    if secs <= 0.0 {
        nominal.as_secs_f64()
    } else {
        secs
    }
}

/// Kilobytes per second between two counter readings. A counter that went
/// backwards (reset after suspend or reboot) yields zero, never a negative rate.
pub fn kb_per_sec(previous: u64, current: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    current.saturating_sub(previous) as f64 / 1024.0 / elapsed_secs
}
