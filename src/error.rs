//! Error types for each component. Every failure is contained by the component
//! that produced it and reported through its own return channel.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single metric reading.
///
/// A missing thermal sensor is not an error: temperature reads return
/// `Ok(None)` in that case.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// The sensor file exists but does not hold an integer.
    #[error("invalid sensor reading {raw:?} from {}", path.display())]
    SensorInvalid { path: PathBuf, raw: String },

    /// The OS call behind the reading failed.
    #[error("metric read failed: {0}")]
    ReadFailure(String),
}

impl MetricError {
    pub fn read_failure<S: Into<String>>(msg: S) -> Self {
        Self::ReadFailure(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum ScriptError {
    /// A previous run has not reported its exit yet.
    #[error("an update script is already running")]
    AlreadyRunning,

    #[error("failed to launch '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum TerminalError {
    /// The shell has exited or the session was closed.
    #[error("terminal session is closed")]
    SessionClosed,

    #[error("failed to start shell: {0}")]
    SpawnFailed(String),

    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TerminalError {
    pub fn spawn_failed<S: Into<String>>(msg: S) -> Self {
        Self::SpawnFailed(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
