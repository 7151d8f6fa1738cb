use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::warn;

use crate::error::TerminalError;
use crate::model::Pane;
use crate::terminal::KeyInput;

use super::state::PendingActionKind;
use super::App;

/// Result of handling a key: Quit the app, or key was consumed (needs render).
/// None means the key was not handled.
pub enum InputResult {
    Quit,
    Consumed,
}

/// Handle a key event. Returns Some(Quit) to exit, Some(Consumed) if key was handled and
/// a render is needed, None if the key was not handled.
pub fn handle_key(app: &mut App, key_event: KeyEvent) -> Option<InputResult> {
    if key_event.kind == KeyEventKind::Release {
        return None;
    }
    let KeyEvent { code, modifiers, .. } = key_event;

    if let Some(pa) = app.pending_action.take() {
        if code == KeyCode::Char('y') || code == KeyCode::Char('Y') {
            match pa.kind {
                PendingActionKind::RunUpdate => app.start_update(),
            }
        }
        return Some(InputResult::Consumed);
    }

    match code {
        KeyCode::F(10) => return Some(InputResult::Quit),
        KeyCode::F(6) => {
            app.focus = app.focus.toggled();
            return Some(InputResult::Consumed);
        }
        KeyCode::F(2) => {
            app.request_update(Instant::now());
            return Some(InputResult::Consumed);
        }
        _ => {}
    }

    match app.focus {
        Pane::Update => handle_update_pane(app, code, modifiers),
        Pane::Terminal => handle_terminal_pane(app, &key_event),
    }
}

fn handle_update_pane(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Option<InputResult> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(InputResult::Quit),
        KeyCode::Char('c') => {
            app.clear_update_output();
            Some(InputResult::Consumed)
        }
        _ => None,
    }
}

fn handle_terminal_pane(app: &mut App, key_event: &KeyEvent) -> Option<InputResult> {
    let key = KeyInput::from_key_event(key_event)?;
    let Some(session) = app.terminal.as_mut() else {
        app.status_message = Some("No shell session".to_string());
        return Some(InputResult::Consumed);
    };

    match session.send_key(key) {
        // The echo arrives with the next drain.
        Ok(()) => None,
        Err(TerminalError::SessionClosed) => {
            app.status_message = Some("Shell has exited".to_string());
            Some(InputResult::Consumed)
        }
        Err(e) => {
            warn!("failed to write to shell: {}", e);
            app.status_message = Some(format!("Shell write failed: {}", e));
            Some(InputResult::Consumed)
        }
    }
}
