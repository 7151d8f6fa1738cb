use std::path::Path;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{info, warn};

use crate::error::ScriptError;
use crate::script::{self, OutputStream, ScriptCommand, ScriptEvent};

/// Maximum events handed out per `poll_events` call so a chatty script
/// cannot starve the render loop.
const MAX_EVENTS_PER_POLL: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Running,
    Exited(Option<i32>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub bytes: Vec<u8>,
}

/// One execution of the update script.
#[derive(Debug)]
pub struct ProcessHandle {
    pub run_id: u64,
    pub pid: Option<u32>,
    pub state: RunState,
    pub output: Vec<OutputChunk>,
}

/// Runs the update script, at most one instance at a time.
pub struct ScriptRunner {
    runtime: Handle,
    elevate_with: Option<String>,
    handle: Option<ProcessHandle>,
    receiver: Option<mpsc::Receiver<ScriptEvent>>,
    next_run_id: u64,
}

impl ScriptRunner {
    pub fn new(runtime: Handle, elevate_with: Option<String>) -> Self {
        Self {
            runtime,
            elevate_with,
            handle: None,
            receiver: None,
            next_run_id: 1,
        }
    }

    /// Launch `path` with `args`. Fails with `AlreadyRunning` while a previous
    /// run has not delivered its exit event.
    pub fn start(&mut self, path: &Path, args: &[String]) -> Result<&ProcessHandle, ScriptError> {
        if self.is_running() {
            return Err(ScriptError::AlreadyRunning);
        }

        let command = ScriptCommand::new(&path.to_string_lossy(), args, self.elevate_with.as_deref());
        let (pid, receiver) = script::launch(&command, &self.runtime)?;

        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.receiver = Some(receiver);
        Ok(self.handle.insert(ProcessHandle {
            run_id,
            pid,
            state: RunState::Running,
            output: Vec::new(),
        }))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.handle, Some(ProcessHandle { state: RunState::Running, .. }))
    }

    pub fn handle(&self) -> Option<&ProcessHandle> {
        self.handle.as_ref()
    }

    /// Drain pending events without blocking, in arrival order. A channel that
    /// closes before the exit event arrives is reported as `Exited(None)`.
    pub fn poll_events(&mut self) -> Vec<ScriptEvent> {
        let mut events = Vec::new();
        let Some(receiver) = self.receiver.as_mut() else {
            return events;
        };

        let mut finished = false;
        for _ in 0..MAX_EVENTS_PER_POLL {
            match receiver.try_recv() {
                Ok(event) => {
                    let exited = matches!(event, ScriptEvent::Exited { .. });
                    events.push(event);
                    if exited {
                        finished = true;
                        break;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("update script channel closed without an exit status");
                    events.push(ScriptEvent::Exited { code: None });
                    finished = true;
                    break;
                }
            }
        }
        if finished {
            self.receiver = None;
        }

        if let Some(handle) = self.handle.as_mut() {
            for event in &events {
                match event {
                    ScriptEvent::Output { stream, bytes } => handle.output.push(OutputChunk {
                        stream: *stream,
                        bytes: bytes.clone(),
                    }),
                    ScriptEvent::Exited { code } => handle.state = RunState::Exited(*code),
                }
            }
        }
        events
    }

    /// Forget a finished run. A run still in progress is left alone.
    pub fn acknowledge(&mut self) {
        if matches!(self.handle, Some(ProcessHandle { state: RunState::Exited(_), .. })) {
            if let Some(handle) = self.handle.take() {
                info!(run_id = handle.run_id, "update run acknowledged");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;

    fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join("update.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        file.write_all(body.as_bytes()).unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn drain_until_exit(runner: &mut ScriptRunner) -> Vec<ScriptEvent> {
        let mut all = Vec::new();
        for _ in 0..500 {
            let events = runner.poll_events();
            let done = events.iter().any(|e| matches!(e, ScriptEvent::Exited { .. }));
            all.extend(events);
            if done {
                return all;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("script did not exit in time");
    }

    fn stdout_text(events: &[ScriptEvent]) -> String {
        let mut bytes = Vec::new();
        for event in events {
            if let ScriptEvent::Output { stream: OutputStream::Stdout, bytes: b } = event {
                bytes.extend_from_slice(b);
            }
        }
        String::from_utf8(bytes).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn streams_output_then_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "echo hello\necho oops >&2\nexit 3\n");
        let mut runner = ScriptRunner::new(Handle::current(), None);

        let run_id = runner.start(&path, &[]).unwrap().run_id;
        assert_eq!(run_id, 1);
        assert!(runner.is_running());

        let events = drain_until_exit(&mut runner).await;
        assert_eq!(events.last(), Some(&ScriptEvent::Exited { code: Some(3) }));
        assert_eq!(
            events.iter().filter(|e| matches!(e, ScriptEvent::Exited { .. })).count(),
            1
        );
        assert_eq!(stdout_text(&events), "hello\n");
        assert!(events.iter().any(|e| matches!(
            e,
            ScriptEvent::Output { stream: OutputStream::Stderr, .. }
        )));

        let handle = runner.handle().unwrap();
        assert_eq!(handle.state, RunState::Exited(Some(3)));
        assert!(!runner.is_running());
        assert!(runner.poll_events().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_start_is_rejected_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "sleep 0.3\necho done\n");
        let mut runner = ScriptRunner::new(Handle::current(), None);

        runner.start(&path, &[]).unwrap();
        assert!(matches!(runner.start(&path, &[]), Err(ScriptError::AlreadyRunning)));

        let events = drain_until_exit(&mut runner).await;
        assert_eq!(events.last(), Some(&ScriptEvent::Exited { code: Some(0) }));

        let second = runner.start(&path, &[]).unwrap();
        assert_eq!(second.run_id, 2);
        drain_until_exit(&mut runner).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn arguments_are_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "echo \"$1-$2\"\n");
        let mut runner = ScriptRunner::new(Handle::current(), None);

        runner.start(&path, &["a".to_string(), "b".to_string()]).unwrap();
        let events = drain_until_exit(&mut runner).await;
        assert_eq!(stdout_text(&events), "a-b\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn missing_script_fails_to_spawn() {
        let mut runner = ScriptRunner::new(Handle::current(), None);
        let err = runner.start(Path::new("/nonexistent/update.sh"), &[]).unwrap_err();
        assert!(matches!(err, ScriptError::SpawnFailed { .. }));
        assert!(!runner.is_running());
        assert!(runner.handle().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn acknowledge_clears_finished_run_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "sleep 0.2\n");
        let mut runner = ScriptRunner::new(Handle::current(), None);

        runner.start(&path, &[]).unwrap();
        runner.acknowledge();
        assert!(runner.handle().is_some());

        drain_until_exit(&mut runner).await;
        runner.acknowledge();
        assert!(runner.handle().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn killed_script_reports_no_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "kill -9 $$\n");
        let mut runner = ScriptRunner::new(Handle::current(), None);

        runner.start(&path, &[]).unwrap();
        let events = drain_until_exit(&mut runner).await;
        assert_eq!(events.last(), Some(&ScriptEvent::Exited { code: None }));
    }
}
