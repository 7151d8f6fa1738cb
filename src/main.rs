//! rkmon binary: full-screen monitor, or a single JSON sample with `--once`.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use clap::Parser;
use rkmon::collectors;
use rkmon::config::{Config, Overrides};
use rkmon::controller::Sampler;
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rkmon")]
#[command(about = "System monitor, update runner and shell for single-board computers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// JSON config file; command line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Metric sampling interval in milliseconds
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Terminal drain interval in milliseconds
    #[arg(long)]
    drain_ms: Option<u64>,

    /// Update script run by F2
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Run the update script without sudo
    #[arg(long)]
    no_elevate: bool,

    /// Shell started in the terminal pane
    #[arg(long)]
    shell: Option<String>,

    /// Thermal sensor file, highest priority first (repeatable)
    #[arg(long = "thermal-path")]
    thermal_paths: Vec<PathBuf>,

    /// Log file (the screen belongs to the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print one metric sample as JSON and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            sample_interval_ms: self.interval_ms,
            drain_interval_ms: self.drain_ms,
            script_path: self.script.clone(),
            no_elevate: self.no_elevate,
            shell: self.shell.clone(),
            thermal_paths: self.thermal_paths.clone(),
        }
    }

    fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("rkmon.log"))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli)?;

    let config = Config::load(cli.config.as_deref(), &cli.overrides()).inspect_err(|e| {
        error!("{}", e);
    })?;
    info!(?config, "configuration loaded");

    if cli.once {
        return print_one_sample(&config);
    }

    let should_quit = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGTERM, Arc::clone(&should_quit))?;
    signal_hook::flag::register(SIGINT, Arc::clone(&should_quit))?;

    rkmon::app::run(config, should_quit)?;
    Ok(())
}

fn init_logging(cli: &Cli) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(cli.log_path())?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| -> Box<dyn std::error::Error> { e })?;

    Ok(guard)
}

/// Baseline plus one tick a nominal period later, so the disk rates are real.
fn print_one_sample(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut sampler = Sampler::new(collectors::default_source(config), config.sample_interval());
    sampler.start(Instant::now());
    std::thread::sleep(config.sample_interval());

    match sampler.tick(Instant::now()) {
        Some(sample) => {
            println!("{}", serde_json::to_string_pretty(sample)?);
            Ok(())
        }
        None => Err("sampler produced no sample".into()),
    }
}
