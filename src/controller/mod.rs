//! Metric sampling: drives a MetricSource on a fixed period, turns cumulative
//! disk counters into rates and publishes one sample per tick.

mod rates;
mod schedule;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::collectors::MetricSource;
use crate::error::MetricError;
use crate::model::{DiskCounters, MetricSample, Reading};

pub use rates::{elapsed_secs, kb_per_sec};
pub use schedule::{Schedule, StopToken};

/// Callback receiving each published sample.
pub type Subscriber = Box<dyn FnMut(&MetricSample) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerState {
    Idle,
    Running,
}

/// Previous disk counter reading; owned by the Sampler alone.
struct DiskCounterSnapshot {
    counters: DiskCounters,
    captured_at: Instant,
}

pub struct Sampler<S> {
    source: S,
    period: Duration,
    state: SamplerState,
    snapshot: Option<DiskCounterSnapshot>,
    subscribers: Vec<Subscriber>,
    latest: Option<MetricSample>,
    stop: StopToken,
    /// Last failure logged per field, so a persistent failure is logged once.
    reported: HashMap<&'static str, String>,
}

impl<S: MetricSource> Sampler<S> {
    pub fn new(source: S, period: Duration) -> Self {
        Self {
            source,
            period,
            state: SamplerState::Idle,
            snapshot: None,
            subscribers: Vec::new(),
            latest: None,
            stop: StopToken::new(),
            reported: HashMap::new(),
        }
    }

    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&MetricSample) + Send + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Idle → Running. Takes the baseline disk reading the first tick's
    /// rates are measured against. Starting a running sampler does nothing.
    pub fn start(&mut self, now: Instant) {
        if self.state() == SamplerState::Running {
            return;
        }
        self.stop.rearm();
        self.snapshot = match self.source.read_disk_counters() {
            Ok(counters) => Some(DiskCounterSnapshot { counters, captured_at: now }),
            Err(e) => {
                self.report("disk", &e);
                None
            }
        };
        self.state = SamplerState::Running;
        info!("sampler started with {}ms period", self.period.as_millis());
    }

    /// Running → Idle. Safe to call from a subscriber via a cloned [`StopToken`].
    pub fn stop(&mut self) {
        self.stop.stop();
        self.state = SamplerState::Idle;
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn state(&self) -> SamplerState {
        if self.stop.is_stopped() {
            SamplerState::Idle
        } else {
            self.state
        }
    }

    /// Most recent sample; each tick replaces it.
    pub fn latest(&self) -> Option<&MetricSample> {
        self.latest.as_ref()
    }

    /// One read-and-publish cycle at `now`. Returns `None` while idle.
    pub fn tick(&mut self, now: Instant) -> Option<&MetricSample> {
        if self.state() != SamplerState::Running {
            self.state = SamplerState::Idle;
            return None;
        }

        let cpu_percent = self.reading("cpu", |s| s.read_cpu_percent());
        let memory_percent = self.reading("memory", |s| s.read_memory_percent());
        let cpu_temperature_celsius = match self.source.read_cpu_temperature() {
            Ok(Some(celsius)) => {
                self.reported.remove("temperature");
                Reading::Ok(celsius)
            }
            Ok(None) => {
                self.reported.remove("temperature");
                Reading::Unavailable
            }
            Err(e) => {
                self.report("temperature", &e);
                Reading::from(e)
            }
        };
        let (disk_read_rate_kb_per_s, disk_write_rate_kb_per_s) = self.disk_rates(now);

        let sample = MetricSample {
            time: Local::now().format("%H:%M:%S").to_string(),
            cpu_percent,
            memory_percent,
            cpu_temperature_celsius,
            disk_read_rate_kb_per_s,
            disk_write_rate_kb_per_s,
        };
        debug!(?sample, "sample");

        for subscriber in self.subscribers.iter_mut() {
            subscriber(&sample);
        }
        self.latest = Some(sample);
        self.latest.as_ref()
    }

    fn reading(
        &mut self,
        field: &'static str,
        read: impl FnOnce(&mut S) -> Result<f64, MetricError>,
    ) -> Reading {
        match read(&mut self.source) {
            Ok(value) => {
                self.reported.remove(field);
                Reading::Ok(value)
            }
            Err(e) => {
                self.report(field, &e);
                Reading::from(e)
            }
        }
    }

    fn disk_rates(&mut self, now: Instant) -> (Reading, Reading) {
        let counters = match self.source.read_disk_counters() {
            Ok(counters) => counters,
            Err(e) => {
                // Keep the old snapshot; the next good read spans both ticks.
                self.report("disk", &e);
                return (Reading::from(e.clone()), Reading::from(e));
            }
        };
        self.reported.remove("disk");

        let rates = match self.snapshot {
            Some(ref prev) => {
                let elapsed = elapsed_secs(now, prev.captured_at, self.period);
                (
                    Reading::Ok(kb_per_sec(prev.counters.read_bytes, counters.read_bytes, elapsed)),
                    Reading::Ok(kb_per_sec(prev.counters.write_bytes, counters.write_bytes, elapsed)),
                )
            }
            None => (Reading::Ok(0.0), Reading::Ok(0.0)),
        };
        self.snapshot = Some(DiskCounterSnapshot { counters, captured_at: now });
        rates
    }

    fn report(&mut self, field: &'static str, err: &MetricError) {
        let msg = err.to_string();
        if self.reported.get(field) != Some(&msg) {
            warn!(field, "{}", msg);
            self.reported.insert(field, msg);
        }
    }

    /// Start and tick on a tokio interval until the stop token fires.
    /// Missed ticks are delayed rather than bursted. Returns the stopped sampler.
    pub async fn run(mut self) -> Self {
        let stop = self.stop_token();
        let start = tokio::time::Instant::now();
        self.start(start.into_std());

        let mut interval = tokio::time::interval_at(start + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !stop.is_stopped() {
            tokio::select! {
                _ = stop.stopped() => break,
                at = interval.tick() => {
                    self.tick(at.into_std());
                }
            }
        }

        self.state = SamplerState::Idle;
        info!("sampler stopped");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Fixed cpu/memory, disk read counter grows by `step` on every read.
    struct StubSource {
        read_bytes: u64,
        step: u64,
        temperature: Result<Option<f64>, MetricError>,
        fail_cpu: bool,
    }

    impl StubSource {
        fn new(step: u64) -> Self {
            Self { read_bytes: 0, step, temperature: Ok(Some(45.0)), fail_cpu: false }
        }
    }

    impl MetricSource for StubSource {
        fn read_cpu_percent(&mut self) -> Result<f64, MetricError> {
            if self.fail_cpu {
                Err(MetricError::read_failure("cpu gone"))
            } else {
                Ok(10.0)
            }
        }

        fn read_memory_percent(&mut self) -> Result<f64, MetricError> {
            Ok(50.0)
        }

        fn read_disk_counters(&mut self) -> Result<DiskCounters, MetricError> {
            self.read_bytes += self.step;
            Ok(DiskCounters { read_bytes: self.read_bytes, write_bytes: 0 })
        }

        fn read_cpu_temperature(&mut self) -> Result<Option<f64>, MetricError> {
            self.temperature.clone()
        }
    }

    fn collect_into(sampler: &mut Sampler<StubSource>) -> Arc<Mutex<Vec<MetricSample>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        sampler.subscribe(move |s| sink.lock().unwrap().push(s.clone()));
        received
    }

    #[test]
    fn three_ticks_publish_three_samples_with_rates() {
        let mut sampler = Sampler::new(StubSource::new(1024), Duration::from_secs(1));
        let received = collect_into(&mut sampler);

        let t0 = Instant::now();
        sampler.start(t0);
        for i in 1..=3 {
            sampler.tick(t0 + Duration::from_secs(i));
        }

        let samples = received.lock().unwrap();
        assert_eq!(samples.len(), 3);
        for s in samples.iter() {
            assert_eq!(s.cpu_percent, Reading::Ok(10.0));
            assert_eq!(s.memory_percent, Reading::Ok(50.0));
            assert_eq!(s.cpu_temperature_celsius, Reading::Ok(45.0));
        }
        assert_eq!(samples[1].disk_read_rate_kb_per_s.value(), Some(1.0));
        assert_eq!(samples[2].disk_read_rate_kb_per_s.value(), Some(1.0));
        assert_eq!(samples[2].disk_write_rate_kb_per_s.value(), Some(0.0));
    }

    #[test]
    fn rate_uses_actual_elapsed_time() {
        let mut sampler = Sampler::new(StubSource::new(2048), Duration::from_secs(1));
        let t0 = Instant::now();
        sampler.start(t0);
        let sample = sampler.tick(t0 + Duration::from_secs(2)).cloned().unwrap();
        assert_eq!(sample.disk_read_rate_kb_per_s.value(), Some(1.0));
    }

    #[test]
    fn counter_reset_reports_zero_rate() {
        let mut sampler = Sampler::new(StubSource::new(4096), Duration::from_secs(1));
        let t0 = Instant::now();
        sampler.start(t0);
        sampler.tick(t0 + Duration::from_secs(1));
        sampler.source.read_bytes = 0;
        let sample = sampler.tick(t0 + Duration::from_secs(2)).cloned().unwrap();
        assert_eq!(sample.disk_read_rate_kb_per_s, Reading::Ok(0.0));
    }

    #[test]
    fn one_failed_reading_does_not_block_the_others() {
        let mut source = StubSource::new(1024);
        source.fail_cpu = true;
        source.temperature = Err(MetricError::SensorInvalid {
            path: "/sys/class/thermal/thermal_zone0/temp".into(),
            raw: "N/A".into(),
        });
        let mut sampler = Sampler::new(source, Duration::from_secs(1));
        let t0 = Instant::now();
        sampler.start(t0);
        let sample = sampler.tick(t0 + Duration::from_secs(1)).cloned().unwrap();

        assert_eq!(sample.cpu_percent, Reading::Failed("cpu gone".into()));
        assert_eq!(sample.cpu_temperature_celsius, Reading::Invalid("N/A".into()));
        assert_eq!(sample.memory_percent, Reading::Ok(50.0));
        assert_eq!(sample.disk_read_rate_kb_per_s, Reading::Ok(1.0));
    }

    /// Formatted log output shared with a test subscriber.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogCapture {
        fn count(&self, needle: &str) -> usize {
            String::from_utf8_lossy(&self.0.lock().unwrap()).matches(needle).count()
        }
    }

    fn invalid_sensor(raw: &str) -> Result<Option<f64>, MetricError> {
        Err(MetricError::SensorInvalid {
            path: "/sys/class/thermal/thermal_zone0/temp".into(),
            raw: raw.into(),
        })
    }

    #[test]
    fn sensor_fault_is_logged_once_per_distinct_reading() {
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut source = StubSource::new(0);
            source.temperature = invalid_sensor("garbage");
            let mut sampler = Sampler::new(source, Duration::from_secs(1));
            let t0 = Instant::now();
            sampler.start(t0);
            let mut at = t0;
            let mut tick = |sampler: &mut Sampler<StubSource>| {
                at += Duration::from_secs(1);
                sampler.tick(at);
            };

            tick(&mut sampler);
            tick(&mut sampler);
            sampler.source.temperature = invalid_sensor("x7");
            tick(&mut sampler);
            tick(&mut sampler);
            // Recovery re-arms the warning
            sampler.source.temperature = Ok(Some(40.0));
            tick(&mut sampler);
            sampler.source.temperature = invalid_sensor("x7");
            tick(&mut sampler);
        });

        assert_eq!(capture.count("\"garbage\""), 1);
        assert_eq!(capture.count("\"x7\""), 2);
    }

    #[test]
    fn missing_sensor_is_unavailable() {
        let mut source = StubSource::new(0);
        source.temperature = Ok(None);
        let mut sampler = Sampler::new(source, Duration::from_secs(1));
        let t0 = Instant::now();
        sampler.start(t0);
        let sample = sampler.tick(t0 + Duration::from_secs(1)).cloned().unwrap();
        assert_eq!(sample.cpu_temperature_celsius, Reading::Unavailable);
    }

    #[test]
    fn idle_sampler_does_not_publish() {
        let mut sampler = Sampler::new(StubSource::new(1), Duration::from_secs(1));
        let received = collect_into(&mut sampler);
        assert!(sampler.tick(Instant::now()).is_none());
        assert_eq!(sampler.state(), SamplerState::Idle);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn stop_from_callback_takes_effect_on_next_tick() {
        let mut sampler = Sampler::new(StubSource::new(1), Duration::from_secs(1));
        let token = sampler.stop_token();
        let received = collect_into(&mut sampler);
        sampler.subscribe(move |_| token.stop());

        let t0 = Instant::now();
        sampler.start(t0);
        assert!(sampler.tick(t0 + Duration::from_secs(1)).is_some());
        assert_eq!(sampler.state(), SamplerState::Idle);
        assert!(sampler.tick(t0 + Duration::from_secs(2)).is_none());
        assert_eq!(received.lock().unwrap().len(), 1);

        sampler.start(t0 + Duration::from_secs(3));
        assert_eq!(sampler.state(), SamplerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_stops_from_inside_a_subscriber() {
        let mut sampler = Sampler::new(StubSource::new(1024), Duration::from_secs(1));
        let token = sampler.stop_token();
        let received = collect_into(&mut sampler);
        let count = Arc::clone(&received);
        sampler.subscribe(move |_| {
            if count.lock().unwrap().len() == 3 {
                token.stop();
            }
        });

        let sampler = sampler.run().await;

        let samples = received.lock().unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|s| s.disk_read_rate_kb_per_s.value() == Some(1.0)));
        assert_eq!(sampler.state(), SamplerState::Idle);
    }
}
