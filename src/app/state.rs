use std::time::{Duration, Instant};

/// How long a confirmation prompt stays open.
pub const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Privileged action awaiting confirmation.
pub struct PendingAction {
    pub description: String,
    pub kind: PendingActionKind,
    pub expires: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingActionKind {
    RunUpdate,
}

impl PendingAction {
    pub fn run_update(script: &str, now: Instant) -> Self {
        Self {
            description: format!("Run update script {}?", script),
            kind: PendingActionKind::RunUpdate,
            expires: now + CONFIRMATION_TIMEOUT,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires
    }
}
