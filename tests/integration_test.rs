//! Integration tests across the public modules: sampler with a scripted
//! source, the update runner and a real shell on a pty.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rkmon::collectors::MetricSource;
use rkmon::error::{MetricError, TerminalError};
use rkmon::model::{DiskCounters, MetricSample, Reading, TerminalBuffer};
use rkmon::controller::{Sampler, SamplerState};
use rkmon::terminal::{KeyInput, PtySession, TERMINATED_NOTICE};
use rkmon::view::{format_rate, format_temperature};

/// Disk counters advance by 2 KiB read and 1 KiB written per read.
struct ScriptedSource {
    reads: u64,
    temperature: Result<Option<f64>, MetricError>,
}

impl MetricSource for ScriptedSource {
    fn read_cpu_percent(&mut self) -> Result<f64, MetricError> {
        Ok(33.0)
    }

    fn read_memory_percent(&mut self) -> Result<f64, MetricError> {
        Ok(61.5)
    }

    fn read_disk_counters(&mut self) -> Result<DiskCounters, MetricError> {
        self.reads += 1;
        Ok(DiskCounters {
            read_bytes: self.reads * 2048,
            write_bytes: self.reads * 1024,
        })
    }

    fn read_cpu_temperature(&mut self) -> Result<Option<f64>, MetricError> {
        self.temperature.clone()
    }
}

#[test]
fn sampler_publishes_rates_and_temperature() {
    let source = ScriptedSource { reads: 0, temperature: Ok(Some(45.0)) };
    let mut sampler = Sampler::new(source, Duration::from_secs(1));
    let seen: Arc<Mutex<Vec<MetricSample>>> = Arc::default();
    let sink = Arc::clone(&seen);
    sampler.subscribe(move |s| sink.lock().unwrap().push(s.clone()));

    let t0 = Instant::now();
    sampler.start(t0);
    for i in 1..=3 {
        sampler.tick(t0 + Duration::from_secs(i));
    }

    let samples = seen.lock().unwrap();
    assert_eq!(samples.len(), 3);
    for sample in samples.iter() {
        assert_eq!(sample.disk_read_rate_kb_per_s, Reading::Ok(2.0));
        assert_eq!(sample.disk_write_rate_kb_per_s, Reading::Ok(1.0));
        assert_eq!(format_temperature(&sample.cpu_temperature_celsius), "45.0 °C");
    }
    assert_eq!(format_rate(&samples[0].disk_read_rate_kb_per_s), "2.0 KB/s");
}

#[test]
fn invalid_sensor_does_not_hide_other_fields() {
    let source = ScriptedSource {
        reads: 0,
        temperature: Err(MetricError::SensorInvalid {
            path: "/sys/class/thermal/thermal_zone0/temp".into(),
            raw: "garbage".into(),
        }),
    };
    let mut sampler = Sampler::new(source, Duration::from_secs(1));
    let t0 = Instant::now();
    sampler.start(t0);
    let sample = sampler.tick(t0 + Duration::from_secs(1)).unwrap().clone();

    assert_eq!(sample.cpu_percent, Reading::Ok(33.0));
    assert_eq!(sample.memory_percent, Reading::Ok(61.5));
    assert_eq!(sample.cpu_temperature_celsius, Reading::Invalid("garbage".into()));
    assert_eq!(format_temperature(&sample.cpu_temperature_celsius), "Error");
}

#[test]
fn sample_serializes_to_json() {
    let source = ScriptedSource { reads: 0, temperature: Ok(None) };
    let mut sampler = Sampler::new(source, Duration::from_secs(1));
    let t0 = Instant::now();
    sampler.start(t0);
    let sample = sampler.tick(t0 + Duration::from_secs(1)).unwrap();

    let json: serde_json::Value = serde_json::to_value(sample).unwrap();
    assert_eq!(json["cpu_percent"]["status"], "ok");
    assert_eq!(json["cpu_percent"]["value"], 33.0);
    assert_eq!(json["cpu_temperature_celsius"]["status"], "unavailable");
}

#[test]
fn stop_from_subscriber_ends_publishing() {
    let source = ScriptedSource { reads: 0, temperature: Ok(None) };
    let mut sampler = Sampler::new(source, Duration::from_secs(1));
    let token = sampler.stop_token();
    let count = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&count);
    sampler.subscribe(move |_| {
        *counter.lock().unwrap() += 1;
        token.stop();
    });

    let t0 = Instant::now();
    sampler.start(t0);
    assert!(sampler.tick(t0 + Duration::from_secs(1)).is_some());
    assert!(sampler.tick(t0 + Duration::from_secs(2)).is_none());
    assert_eq!(sampler.state(), SamplerState::Idle);
    assert_eq!(*count.lock().unwrap(), 1);
}

/// Poll until `pred` holds for the rendered buffer or the session ends.
fn drain_until(session: &mut PtySession, buffer: &mut TerminalBuffer, pred: impl Fn(&[&str]) -> bool) -> bool {
    for _ in 0..200 {
        match session.poll_output() {
            Ok(chunks) => {
                for chunk in &chunks {
                    buffer.feed(chunk);
                }
            }
            Err(TerminalError::SessionClosed) => return pred(&buffer.tail(50)),
            Err(e) => panic!("poll failed: {}", e),
        }
        if pred(&buffer.tail(50)) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    false
}

#[cfg(unix)]
#[test]
fn real_shell_round_trip() {
    let mut session = match PtySession::open("sh", &[], "dumb", (80, 24)) {
        Ok(session) => session,
        // Sandboxes without /dev/ptmx cannot host the test.
        Err(TerminalError::SpawnFailed(msg)) => {
            eprintln!("skipping: {}", msg);
            return;
        }
        Err(e) => panic!("unexpected error: {}", e),
    };
    let mut buffer = TerminalBuffer::new(500);

    for c in "echo rk$((1+2))".chars() {
        session.send_key(KeyInput::Char(c)).unwrap();
    }
    session.send_key(KeyInput::Enter).unwrap();
    assert!(drain_until(&mut session, &mut buffer, |lines| lines.iter().any(|l| *l == "rk3")));

    session.send_key(KeyInput::CtrlD).unwrap();
    let notice = TERMINATED_NOTICE.trim();
    assert!(drain_until(&mut session, &mut buffer, |lines| lines.contains(&notice)));
    assert!(!session.is_alive());
    assert!(matches!(session.send_key(KeyInput::Enter), Err(TerminalError::SessionClosed)));

    session.close();
    session.close();
}

#[cfg(target_os = "linux")]
#[test]
fn shell_does_not_inherit_the_pty_master() {
    let args = vec!["-c".to_string(), "ls -l /proc/$$/fd".to_string()];
    let mut session = match PtySession::open("sh", &args, "dumb", (120, 24)) {
        Ok(session) => session,
        Err(TerminalError::SpawnFailed(msg)) => {
            eprintln!("skipping: {}", msg);
            return;
        }
        Err(e) => panic!("unexpected error: {}", e),
    };
    let mut buffer = TerminalBuffer::new(500);

    let notice = TERMINATED_NOTICE.trim();
    assert!(drain_until(&mut session, &mut buffer, |lines| lines.contains(&notice)));
    let listing = buffer.tail(50);
    assert!(listing.iter().any(|l| l.contains("/dev/pts/")), "{:?}", listing);
    assert!(!listing.iter().any(|l| l.contains("ptmx")), "{:?}", listing);
    let pts_fds = listing.iter().filter(|l| l.contains("/dev/pts/")).count();
    assert!(pts_fds <= 3, "{:?}", listing);
}
