use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// A key press destined for the shell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
    Enter,
    Left,
    Right,
    Up,
    Down,
    CtrlC,
    CtrlD,
}

impl KeyInput {
    /// Bytes written to the pty for this key.
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            KeyInput::Char(c) => {
                let mut buf = [0u8; 4];
                c.encode_utf8(&mut buf).as_bytes().to_vec()
            }
            KeyInput::Backspace => vec![0x08],
            KeyInput::Enter => vec![0x0d],
            KeyInput::Left => b"\x1b[D".to_vec(),
            KeyInput::Right => b"\x1b[C".to_vec(),
            KeyInput::Up => b"\x1b[A".to_vec(),
            KeyInput::Down => b"\x1b[B".to_vec(),
            KeyInput::CtrlC => vec![0x03],
            KeyInput::CtrlD => vec![0x04],
        }
    }

    /// Map a crossterm key event. Releases and keys without a shell
    /// meaning yield `None`.
    pub fn from_key_event(key: &KeyEvent) -> Option<Self> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') if ctrl => Some(KeyInput::CtrlC),
            KeyCode::Char('d') | KeyCode::Char('D') if ctrl => Some(KeyInput::CtrlD),
            KeyCode::Char(_) if ctrl => None,
            KeyCode::Char(c) => Some(KeyInput::Char(c)),
            KeyCode::Tab => Some(KeyInput::Char('\t')),
            KeyCode::Esc => Some(KeyInput::Char('\x1b')),
            KeyCode::Backspace => Some(KeyInput::Backspace),
            KeyCode::Enter => Some(KeyInput::Enter),
            KeyCode::Left => Some(KeyInput::Left),
            KeyCode::Right => Some(KeyInput::Right),
            KeyCode::Up => Some(KeyInput::Up),
            KeyCode::Down => Some(KeyInput::Down),
            _ => None,
        }
    }
}
