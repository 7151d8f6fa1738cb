//! Launching the update script and streaming its output.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::ScriptError;

/// Read size for each output chunk.
const CHUNK_SIZE: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Notification from a running script. Output events for a run always
/// precede its single `Exited` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptEvent {
    Output { stream: OutputStream, bytes: Vec<u8> },
    /// `None` when the process was killed by a signal.
    Exited { code: Option<i32> },
}

/// Program and arguments actually executed, elevation prefix included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ScriptCommand {
    /// `sudo <path> <args..>` when `elevate_with` is set, `<path> <args..>` otherwise.
    pub fn new(path: &str, args: &[String], elevate_with: Option<&str>) -> Self {
        match elevate_with {
            Some(elevator) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(path.to_string());
                full.extend(args.iter().cloned());
                Self { program: elevator.to_string(), args: full }
            }
            None => Self { program: path.to_string(), args: args.to_vec() },
        }
    }
}

/// Spawn `command` on `handle` with stdout and stderr piped. Returns the pid
/// and the receiver the run's events arrive on.
pub fn launch(
    command: &ScriptCommand,
    handle: &tokio::runtime::Handle,
) -> Result<(Option<u32>, mpsc::Receiver<ScriptEvent>), ScriptError> {
    // Child pipes register with the runtime's reactor.
    let _guard = handle.enter();

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ScriptError::SpawnFailed {
            program: command.program.clone(),
            source,
        })?;

    let pid = child.id();
    info!(pid, program = %command.program, args = ?command.args, "update script started");

    let (tx, rx) = mpsc::channel::<ScriptEvent>(256);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    handle.spawn(async move {
        let out_task = stdout.map(|r| tokio::spawn(pump(r, OutputStream::Stdout, tx.clone())));
        let err_task = stderr.map(|r| tokio::spawn(pump(r, OutputStream::Stderr, tx.clone())));
        if let Some(task) = out_task {
            let _ = task.await;
        }
        if let Some(task) = err_task {
            let _ = task.await;
        }

        let code = match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("failed to wait for update script: {}", e);
                None
            }
        };
        info!(?code, "update script exited");
        let _ = tx.send(ScriptEvent::Exited { code }).await;
    });

    Ok((pid, rx))
}

/// Forward one pipe to the event channel until EOF or the receiver is gone.
async fn pump<R>(mut reader: R, stream: OutputStream, tx: mpsc::Sender<ScriptEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let event = ScriptEvent::Output { stream, bytes: buf[..n].to_vec() };
                if tx.send(event).await.is_err() {
                    break; // receiver dropped
                }
            }
            Err(e) => {
                warn!(?stream, "failed to read script output: {}", e);
                break;
            }
        }
    }
}
