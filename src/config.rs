//! Startup configuration: built-in defaults, an optional JSON file, then CLI overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_DRAIN_INTERVAL_MS: u64 = 50;
pub const DEFAULT_SCRIPT_NAME: &str = "auto-update.sh";

/// Thermal zone files probed for the CPU package temperature, first existing wins.
pub const DEFAULT_THERMAL_PATHS: [&str; 2] = [
    "/sys/class/thermal/thermal_zone0/temp",
    "/sys/class/thermal/thermal_zone1/temp",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metric sampling period in milliseconds
    pub sample_interval_ms: u64,
    /// Pseudo-terminal drain period in milliseconds
    pub drain_interval_ms: u64,
    /// Update script launched by the Update action
    pub script_path: PathBuf,
    /// Elevation command prefixed to the script (e.g. `sudo`); `None` runs it directly
    pub elevate_with: Option<String>,
    pub shell: String,
    pub shell_args: Vec<String>,
    /// Value of TERM handed to the shell
    pub term: String,
    pub thermal_paths: Vec<PathBuf>,
    /// Lines retained by the script and terminal panes
    pub output_line_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            drain_interval_ms: DEFAULT_DRAIN_INTERVAL_MS,
            script_path: default_script_path(),
            elevate_with: Some("sudo".to_string()),
            shell: "bash".to_string(),
            shell_args: Vec::new(),
            term: "dumb".to_string(),
            thermal_paths: DEFAULT_THERMAL_PATHS.iter().map(PathBuf::from).collect(),
            output_line_cap: 5000,
        }
    }
}

/// The update script lives next to the executable.
fn default_script_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_SCRIPT_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_NAME))
}

/// Overrides collected from the command line. `None` leaves the loaded value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub sample_interval_ms: Option<u64>,
    pub drain_interval_ms: Option<u64>,
    pub script_path: Option<PathBuf>,
    pub no_elevate: bool,
    pub shell: Option<String>,
    pub thermal_paths: Vec<PathBuf>,
}

impl Config {
    /// Defaults, then `path` if given, then `overrides`; the result is validated.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(ms) = overrides.sample_interval_ms {
            self.sample_interval_ms = ms;
        }
        if let Some(ms) = overrides.drain_interval_ms {
            self.drain_interval_ms = ms;
        }
        if let Some(ref script) = overrides.script_path {
            self.script_path = script.clone();
        }
        if overrides.no_elevate {
            self.elevate_with = None;
        }
        if let Some(ref shell) = overrides.shell {
            self.shell = shell.clone();
        }
        if !overrides.thermal_paths.is_empty() {
            self.thermal_paths = overrides.thermal_paths.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Invalid("sample_interval_ms must be > 0".into()));
        }
        if self.drain_interval_ms == 0 {
            return Err(ConfigError::Invalid("drain_interval_ms must be > 0".into()));
        }
        if self.shell.trim().is_empty() {
            return Err(ConfigError::Invalid("shell must not be empty".into()));
        }
        if self.output_line_cap == 0 {
            return Err(ConfigError::Invalid("output_line_cap must be > 0".into()));
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}
