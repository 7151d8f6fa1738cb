use std::time::Instant;

use tracing::debug;

use crate::error::TerminalError;
use crate::script::ScriptEvent;

use super::App;

impl App {
    /// Take a metric sample when the sampling period has elapsed.
    pub fn process_tick(&mut self, now: Instant) -> bool {
        if !self.sample_schedule.is_due(now) {
            return false;
        }
        self.sampler.tick(now).is_some()
    }

    /// Drain pending shell output on the drain period.
    pub fn poll_terminal(&mut self, now: Instant) -> bool {
        if !self.drain_schedule.is_due(now) {
            return false;
        }
        let Some(session) = self.terminal.as_mut() else {
            return false;
        };
        if !session.is_alive() {
            return false;
        }

        match session.poll_output() {
            Ok(chunks) => {
                for chunk in &chunks {
                    self.terminal_buffer.feed(chunk);
                }
                !chunks.is_empty()
            }
            Err(TerminalError::SessionClosed) => false,
            Err(e) => {
                debug!("terminal poll failed: {}", e);
                false
            }
        }
    }

    /// Move script output and exit events into the Update pane.
    pub fn poll_script(&mut self) -> bool {
        let events = self.script_runner.poll_events();
        for event in &events {
            match event {
                ScriptEvent::Output { stream, bytes } => self.script_output.push_chunk(*stream, bytes),
                ScriptEvent::Exited { code } => self.script_output.push_exit(*code),
            }
        }
        !events.is_empty()
    }

    /// Expire pending confirmation if timed out.
    pub fn expire_pending_action(&mut self, now: Instant) -> bool {
        if self.pending_action.as_ref().is_some_and(|pa| pa.is_expired(now)) {
            self.pending_action = None;
            return true;
        }
        false
    }
}
