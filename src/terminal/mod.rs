//! Interactive shell session on a pseudo-terminal.

mod keys;
mod pty;

pub use keys::KeyInput;
#[cfg(unix)]
pub use pty::NativePty;
pub use pty::{PtyChannel, PtyRead};

use tracing::{info, warn};

use crate::error::TerminalError;

/// Final chunk emitted once the shell's output reaches end of stream.
pub const TERMINATED_NOTICE: &str = "\r\n[Process Terminated]\r\n";

/// Chunks handed out per `poll_output` call.
const MAX_CHUNKS_PER_POLL: usize = 64;

pub struct PtySession {
    channel: Box<dyn PtyChannel>,
    alive: bool,
    closed: bool,
}

impl PtySession {
    /// Start `shell` on a new pty sized `cols` x `rows`.
    #[cfg(unix)]
    pub fn open(
        shell: &str,
        args: &[String],
        term: &str,
        size: (u16, u16),
    ) -> Result<Self, TerminalError> {
        let pty = NativePty::spawn(shell, args, term, size)?;
        Ok(Self::with_channel(Box::new(pty)))
    }

    pub fn with_channel(channel: Box<dyn PtyChannel>) -> Self {
        Self {
            channel,
            alive: true,
            closed: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn pid(&self) -> Option<u32> {
        self.channel.pid()
    }

    pub fn send_key(&mut self, key: KeyInput) -> Result<(), TerminalError> {
        self.send_bytes(&key.to_bytes())
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), TerminalError> {
        if !self.alive {
            return Err(TerminalError::SessionClosed);
        }
        self.channel.write_all(bytes)?;
        Ok(())
    }

    /// Return whatever output is pending, possibly nothing, without blocking.
    ///
    /// When the shell's output ends the notice is appended as the last chunk
    /// and the session is marked dead; later polls fail with `SessionClosed`.
    pub fn poll_output(&mut self) -> Result<Vec<Vec<u8>>, TerminalError> {
        if !self.alive {
            return Err(TerminalError::SessionClosed);
        }
        let PtyRead { mut chunks, eof } = self.channel.poll(MAX_CHUNKS_PER_POLL);
        if eof {
            info!(pid = ?self.channel.pid(), "shell output ended");
            self.alive = false;
            chunks.push(TERMINATED_NOTICE.as_bytes().to_vec());
            self.channel.terminate();
        }
        Ok(chunks)
    }

    /// Terminate the shell. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.alive {
            self.alive = false;
            info!(pid = ?self.channel.pid(), "closing terminal session");
        }
        self.channel.terminate();
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if !self.closed {
            warn!("terminal session dropped without close");
            self.close();
        }
    }
}
