mod state;
mod event_loop;
mod render;
mod input;

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossterm::{
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, Clear, ClearType},
};
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::collectors::{self, MetricSource};
use crate::config::Config;
use crate::controller::{Sampler, Schedule};
use crate::model::{Pane, ScriptOutputState, TerminalBuffer};
use crate::script_controller::ScriptRunner;
use crate::terminal::PtySession;
use crate::view::{PaneLayout, Presenter};

pub use input::{handle_key, InputResult};
pub use state::{PendingAction, PendingActionKind, CONFIRMATION_TIMEOUT};

/// Upper bound on how long the loop waits for a key before re-checking timers.
const MAX_EVENT_WAIT: Duration = Duration::from_millis(100);

/// Restore the terminal to normal mode. Safe to call multiple times.
pub fn restore_terminal() {
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Main application state.
pub struct App {
    pub config: Config,
    pub sampler: Sampler<Box<dyn MetricSource + Send>>,
    pub script_runner: ScriptRunner,
    pub script_output: ScriptOutputState,
    pub terminal: Option<PtySession>,
    pub terminal_buffer: TerminalBuffer,
    pub focus: Pane,
    pub pending_action: Option<PendingAction>,
    pub status_message: Option<String>,
    pub sample_schedule: Schedule,
    pub drain_schedule: Schedule,
}

impl App {
    pub fn new(
        config: Config,
        source: Box<dyn MetricSource + Send>,
        runtime: Handle,
        terminal: Option<PtySession>,
    ) -> Self {
        // The first sample lands one period after the disk baseline.
        let started = Instant::now();
        let mut sampler = Sampler::new(source, config.sample_interval());
        sampler.start(started);

        Self {
            script_runner: ScriptRunner::new(runtime, config.elevate_with.clone()),
            script_output: ScriptOutputState::new(config.output_line_cap),
            terminal_buffer: TerminalBuffer::new(config.output_line_cap),
            sample_schedule: Schedule::starting_at(config.sample_interval(), started),
            drain_schedule: Schedule::new(config.drain_interval()),
            sampler,
            terminal,
            focus: Pane::Update,
            pending_action: None,
            status_message: None,
            config,
        }
    }

    /// Ask for confirmation before running the update script.
    pub fn request_update(&mut self, now: Instant) {
        if self.script_runner.is_running() {
            self.status_message = Some("Update already running".to_string());
            return;
        }
        let script = self.config.script_path.display().to_string();
        self.pending_action = Some(PendingAction::run_update(&script, now));
    }

    pub fn start_update(&mut self) {
        match self.script_runner.start(&self.config.script_path, &[]) {
            Ok(handle) => {
                let run_id = handle.run_id;
                self.script_output.begin_run(run_id);
                self.status_message = None;
            }
            Err(e) => {
                warn!("failed to start update script: {}", e);
                self.script_output.push_notice(&format!("Failed to start update: {}", e));
            }
        }
    }

    /// Clear the Update pane once the last run has finished.
    pub fn clear_update_output(&mut self) {
        if self.script_runner.is_running() {
            return;
        }
        self.script_runner.acknowledge();
        self.script_output.clear();
    }

    /// Stop sampling and end the shell session.
    pub fn shutdown(&mut self) {
        self.sampler.stop();
        if let Some(session) = self.terminal.as_mut() {
            session.close();
        }
        info!("shutdown complete");
    }

    /// Time until the next timer needs servicing, capped at `MAX_EVENT_WAIT`.
    fn next_wakeup(&self, now: Instant) -> Duration {
        self.sample_schedule
            .time_until_due(now)
            .min(self.drain_schedule.time_until_due(now))
            .min(MAX_EVENT_WAIT)
    }
}

#[cfg(unix)]
fn open_shell(config: &Config, size: (u16, u16)) -> Result<PtySession, crate::error::TerminalError> {
    PtySession::open(&config.shell, &config.shell_args, &config.term, size)
}

#[cfg(not(unix))]
fn open_shell(_config: &Config, _size: (u16, u16)) -> Result<PtySession, crate::error::TerminalError> {
    Err(crate::error::TerminalError::spawn_failed("pseudo-terminals are not supported on this platform"))
}

/// Run the application. Sets up terminal, runs the main loop, restores terminal on exit.
pub fn run(config: Config, should_quit: Arc<AtomicBool>) -> io::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .build()?;

    let (cols, rows) = terminal::size()?;
    let layout = PaneLayout::for_size(rows);
    let (session, status) = match open_shell(&config, (cols, layout.terminal_rows())) {
        Ok(session) => (Some(session), None),
        Err(e) => {
            warn!("terminal pane disabled: {}", e);
            (None, Some(format!("Shell unavailable: {}", e)))
        }
    };

    let source = collectors::default_source(&config);
    let mut app = App::new(config, source, rt.handle().clone(), session);
    app.status_message = status;

    enable_raw_mode()?;
    let result = execute!(io::stdout(), EnterAlternateScreen, Clear(ClearType::All))
        .and_then(|_| main_loop(&mut app, &should_quit));

    restore_terminal();
    app.shutdown();
    result
}

fn main_loop(app: &mut App, should_quit: &AtomicBool) -> io::Result<()> {
    let mut out = io::stdout();
    let mut needs_render = true;

    loop {
        if should_quit.load(Ordering::Relaxed) {
            info!("quit requested by signal");
            break;
        }

        let now = Instant::now();

        if app.expire_pending_action(now) {
            needs_render = true;
        }
        if app.process_tick(now) {
            needs_render = true;
        }
        if app.poll_terminal(now) {
            needs_render = true;
        }
        if app.poll_script() {
            needs_render = true;
        }

        if needs_render {
            if Presenter::render_size_guard(&mut out)? {
                needs_render = false;
                if crossterm::event::poll(MAX_EVENT_WAIT)? {
                    let _ = crossterm::event::read()?;
                }
                continue;
            }

            render::render(app, &mut out)?;
            out.flush()?;
            needs_render = false;
        }

        if crossterm::event::poll(app.next_wakeup(Instant::now()))? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key_event) => match input::handle_key(app, key_event) {
                    Some(InputResult::Quit) => break,
                    Some(InputResult::Consumed) => needs_render = true,
                    None => {}
                },
                crossterm::event::Event::Resize(_, _) => needs_render = true,
                _ => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::io;
    use std::sync::{Arc, Mutex};

    use crate::collectors::MetricSource;
    use crate::error::MetricError;
    use crate::model::DiskCounters;
    use crate::terminal::{PtyChannel, PtyRead};

    pub struct FixedSource;

    impl MetricSource for FixedSource {
        fn read_cpu_percent(&mut self) -> Result<f64, MetricError> {
            Ok(25.0)
        }
        fn read_memory_percent(&mut self) -> Result<f64, MetricError> {
            Ok(50.0)
        }
        fn read_disk_counters(&mut self) -> Result<DiskCounters, MetricError> {
            Ok(DiskCounters::default())
        }
        fn read_cpu_temperature(&mut self) -> Result<Option<f64>, MetricError> {
            Ok(Some(45.0))
        }
    }

    #[derive(Default)]
    pub struct ShellState {
        pub written: Vec<u8>,
        pub pending: VecDeque<Vec<u8>>,
        pub eof: bool,
    }

    pub struct FakeShell(pub Arc<Mutex<ShellState>>);

    impl PtyChannel for FakeShell {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.0.lock().unwrap().written.extend_from_slice(bytes);
            Ok(())
        }
        fn poll(&mut self, max_chunks: usize) -> PtyRead {
            let mut state = self.0.lock().unwrap();
            let mut read = PtyRead::default();
            while read.chunks.len() < max_chunks {
                match state.pending.pop_front() {
                    Some(chunk) => read.chunks.push(chunk),
                    None => {
                        read.eof = state.eof;
                        break;
                    }
                }
            }
            read
        }
        fn pid(&self) -> Option<u32> {
            None
        }
        fn terminate(&mut self) {}
    }
}
