//! Periodic scheduling and cancellation for the owner loop's activities.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

/// Fixed-period schedule stepped with caller-supplied instants.
#[derive(Debug, Clone)]
pub struct Schedule {
    period: Duration,
    last: Option<Instant>,
}

impl Schedule {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// A schedule whose first slot is one period after `start`.
    pub fn starting_at(period: Duration, start: Instant) -> Self {
        Self { period, last: Some(start) }
    }

    /// True once per elapsed period; the first call is always due.
    ///
    /// Small lateness is absorbed by advancing from the previous slot, so the
    /// cadence does not drift; after a stall longer than one period the
    /// schedule restarts from `now` instead of firing a burst.
    pub fn is_due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) => {
                let since = now.saturating_duration_since(last);
                if since < self.period {
                    return false;
                }
                self.last = if since < self.period * 2 {
                    Some(last + self.period)
                } else {
                    Some(now)
                };
                true
            }
            None => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn time_until_due(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) => self.period.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

/// Cancellation flag shared between a loop and whoever stops it. `stop()`
/// takes no locks, so it may be called from inside the loop's own callbacks.
#[derive(Clone, Default)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn rearm(&self) {
        self.inner.stopped.store(false, Ordering::Release);
    }

    /// Resolves once `stop()` has been called.
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }
}
