use std::io;
use std::sync::mpsc::{Receiver, TryRecvError};

/// Output collected by one non-blocking poll.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PtyRead {
    pub chunks: Vec<Vec<u8>>,
    /// The child side closed; no further output will arrive.
    pub eof: bool,
}

/// Byte pipe to a child attached to a pseudo-terminal.
pub trait PtyChannel: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Return at most `max_chunks` pending chunks without blocking.
    fn poll(&mut self, max_chunks: usize) -> PtyRead;

    fn pid(&self) -> Option<u32>;

    /// Stop the child and reap it. Must be safe to call more than once.
    fn terminate(&mut self);
}

/// Drain up to `max_chunks` from a reader-thread channel. A disconnected
/// channel means the reader hit end of stream.
pub(crate) fn drain_chunks(rx: &Receiver<Vec<u8>>, max_chunks: usize) -> PtyRead {
    let mut read = PtyRead::default();
    while read.chunks.len() < max_chunks {
        match rx.try_recv() {
            Ok(chunk) => read.chunks.push(chunk),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                read.eof = true;
                break;
            }
        }
    }
    read
}

/// Variables the shell keeps from the monitor's environment.
const PASSTHROUGH_ENV: &[&str] = &["HOME", "PATH", "USER", "LOGNAME", "LANG"];

/// Environment for the shell: the passthrough variables found in `vars`,
/// then `TERM`.
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) fn shell_environment<I>(vars: I, term: &str) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut env: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(key, _)| PASSTHROUGH_ENV.contains(&key.as_str()))
        .collect();
    env.push(("TERM".to_string(), term.to_string()));
    env
}

#[cfg(unix)]
pub use native::NativePty;

#[cfg(unix)]
mod native {
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::fd::AsRawFd;
    use std::os::unix::process::CommandExt;
    use std::process::{Child, Command, Stdio};
    use std::sync::mpsc::{self, Receiver};
    use std::thread;
    use std::time::Duration;

    use nix::fcntl::{FcntlArg, FdFlag, fcntl};
    use nix::libc;
    use nix::pty::{Winsize, openpty};
    use nix::sys::signal::{self, Signal};
    use nix::unistd::{Pid, setsid};
    use tracing::{debug, info, warn};

    use super::{PtyChannel, PtyRead, drain_chunks, shell_environment};
    use crate::error::TerminalError;

    const READ_BUF_SIZE: usize = 4096;
    /// How long the shell gets to exit after SIGHUP before it is killed.
    const HANGUP_GRACE: Duration = Duration::from_millis(100);
    const HANGUP_POLL: Duration = Duration::from_millis(10);

    /// A shell running on a freshly allocated pty.
    pub struct NativePty {
        master: File,
        child: Child,
        rx: Receiver<Vec<u8>>,
        reaped: bool,
    }

    impl NativePty {
        /// Start `shell args..` as a session leader with the pty slave as its
        /// controlling terminal.
        pub fn spawn(
            shell: &str,
            args: &[String],
            term: &str,
            size: (u16, u16),
        ) -> Result<Self, TerminalError> {
            let (cols, rows) = size;
            let winsize = Winsize {
                ws_row: rows,
                ws_col: cols,
                ws_xpixel: 0,
                ws_ypixel: 0,
            };
            let pty = openpty(Some(&winsize), None)
                .map_err(|e| TerminalError::spawn_failed(format!("failed to allocate pty: {}", e)))?;

            // Only the dup'd stdio copies of the slave may reach the shell.
            for fd in [pty.master.as_raw_fd(), pty.slave.as_raw_fd()] {
                fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
                    .map_err(|e| TerminalError::spawn_failed(format!("failed to set close-on-exec: {}", e)))?;
            }

            let slave = pty.slave;
            let mut command = Command::new(shell);
            command
                .args(args)
                .env_clear()
                .envs(shell_environment(std::env::vars(), term))
                .stdin(Stdio::from(slave.try_clone()?))
                .stdout(Stdio::from(slave.try_clone()?))
                .stderr(Stdio::from(slave));

            let attach_terminal = || -> io::Result<()> {
                setsid().map_err(io::Error::from)?;
                // SAFETY: fd 0 is the pty slave at this point; TIOCSCTTY takes no pointer.
                if unsafe { libc::ioctl(0, libc::TIOCSCTTY as _, 0) } < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            };
            // SAFETY: the hook only calls async-signal-safe functions.
            unsafe {
                command.pre_exec(attach_terminal);
            }

            let child = command
                .spawn()
                .map_err(|e| TerminalError::spawn_failed(format!("failed to start {}: {}", shell, e)))?;
            // `command` still holds the slave copies; the reader only sees EOF
            // once every slave descriptor is closed.
            drop(command);

            let master = File::from(pty.master);
            let reader = master.try_clone()?;
            let (tx, rx) = mpsc::channel::<Vec<u8>>();
            thread::Builder::new()
                .name("pty-reader".into())
                .spawn(move || read_loop(reader, tx))?;

            info!(pid = child.id(), shell, "terminal session started");
            Ok(Self {
                master,
                child,
                rx,
                reaped: false,
            })
        }

        fn try_reap(&mut self) -> bool {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(?status, "shell exited");
                    self.reaped = true;
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!("failed to poll shell status: {}", e);
                    false
                }
            }
        }
    }

    fn read_loop(mut reader: File, tx: mpsc::Sender<Vec<u8>>) {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break; // session dropped
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // Linux reports EIO once the slave side is gone.
                Err(_) => break,
            }
        }
    }

    impl PtyChannel for NativePty {
        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.master.write_all(bytes)?;
            self.master.flush()
        }

        fn poll(&mut self, max_chunks: usize) -> PtyRead {
            drain_chunks(&self.rx, max_chunks)
        }

        fn pid(&self) -> Option<u32> {
            Some(self.child.id())
        }

        fn terminate(&mut self) {
            if self.reaped || self.try_reap() {
                return;
            }

            let pid = Pid::from_raw(self.child.id() as i32);
            if let Err(e) = signal::kill(pid, Signal::SIGHUP) {
                debug!("SIGHUP to shell failed: {}", e);
            }
            let mut waited = Duration::ZERO;
            while waited < HANGUP_GRACE {
                thread::sleep(HANGUP_POLL);
                waited += HANGUP_POLL;
                if self.try_reap() {
                    return;
                }
            }

            warn!(pid = self.child.id(), "shell ignored SIGHUP, killing");
            let _ = self.child.kill();
            let _ = self.child.wait();
            self.reaped = true;
        }
    }

    impl Drop for NativePty {
        fn drop(&mut self) {
            self.terminate();
        }
    }
}
