use std::collections::VecDeque;

use crate::script::OutputStream;

/// Incremental UTF-8 decoding across chunk boundaries. An incomplete
/// multi-byte tail is held back until the next chunk completes it.
#[derive(Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let buf = std::mem::take(&mut self.pending);
        let mut input = &buf[..];
        let mut out = String::with_capacity(input.len());

        loop {
            match std::str::from_utf8(input) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Ok(s) = std::str::from_utf8(&input[..valid]) {
                        out.push_str(s);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid + len..];
                        }
                        None => {
                            self.pending = input[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

/// Finished display lines plus the one still being written. Retains at
/// most `cap` finished lines.
pub struct LineBuffer {
    pub lines: VecDeque<String>,
    current: String,
    cap: usize,
}

impl LineBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(cap.min(1024)),
            current: String::new(),
            cap: cap.max(1),
        }
    }

    pub fn push_line(&mut self, line: String) {
        if self.lines.len() >= self.cap {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn end_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        self.push_line(line);
    }

    /// Last `n` lines including the unterminated one, oldest first.
    pub fn tail(&self, n: usize) -> Vec<&str> {
        let partial = usize::from(!self.current.is_empty());
        let finished = n.saturating_sub(partial);
        let skip = self.lines.len().saturating_sub(finished);
        let mut out: Vec<&str> = self.lines.iter().skip(skip).map(String::as_str).collect();
        if partial == 1 && n > 0 {
            out.push(&self.current);
        }
        out
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.current.clear();
    }
}

/// Decoder and unterminated line of one script output stream.
#[derive(Default)]
struct StreamLine {
    decoder: Utf8Decoder,
    current: String,
}

impl StreamLine {
    fn push(&mut self, bytes: &[u8], out: &mut LineBuffer) {
        let text = self.decoder.decode(bytes);
        for ch in text.chars() {
            match ch {
                '\n' => out.push_line(std::mem::take(&mut self.current)),
                '\r' => {}
                c => self.current.push(c),
            }
        }
    }

    fn flush(&mut self, out: &mut LineBuffer) {
        if !self.current.is_empty() {
            out.push_line(std::mem::take(&mut self.current));
        }
        self.decoder = Utf8Decoder::default();
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Escape {
    Ground,
    Escape,
    Csi,
    Osc,
    OscEscape,
    Charset,
}

/// Raw pty output rendered to plain lines: escape sequences are dropped,
/// backspace erases, a bare carriage return rewrites the current line.
pub struct TerminalBuffer {
    lines: LineBuffer,
    decoder: Utf8Decoder,
    state: Escape,
    carriage_return: bool,
}

impl TerminalBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            lines: LineBuffer::new(cap),
            decoder: Utf8Decoder::default(),
            state: Escape::Ground,
            carriage_return: false,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        let text = self.decoder.decode(bytes);
        for ch in text.chars() {
            self.feed_char(ch);
        }
    }

    fn feed_char(&mut self, ch: char) {
        match self.state {
            Escape::Ground => match ch {
                '\x1b' => self.state = Escape::Escape,
                '\n' => {
                    self.carriage_return = false;
                    self.lines.end_line();
                }
                '\r' => self.carriage_return = true,
                '\x08' => {
                    self.lines.current.pop();
                }
                '\t' => self.print(ch),
                c if c.is_control() => {}
                c => self.print(c),
            },
            Escape::Escape => {
                self.state = match ch {
                    '[' => Escape::Csi,
                    ']' => Escape::Osc,
                    '(' | ')' => Escape::Charset,
                    _ => Escape::Ground,
                }
            }
            Escape::Csi => {
                if ('\x40'..='\x7e').contains(&ch) {
                    self.state = Escape::Ground;
                }
            }
            Escape::Osc => match ch {
                '\x07' => self.state = Escape::Ground,
                '\x1b' => self.state = Escape::OscEscape,
                _ => {}
            },
            Escape::OscEscape | Escape::Charset => self.state = Escape::Ground,
        }
    }

    fn print(&mut self, ch: char) {
        if self.carriage_return {
            self.carriage_return = false;
            self.lines.current.clear();
        }
        self.lines.current.push(ch);
    }

    pub fn tail(&self, n: usize) -> Vec<&str> {
        self.lines.tail(n)
    }
}

/// Output pane of the update script: cleared on every new run. Lines from
/// stdout and stderr interleave as they complete; each stream assembles its
/// own partial line.
pub struct ScriptOutputState {
    pub buffer: LineBuffer,
    pub run_id: Option<u64>,
    stdout: StreamLine,
    stderr: StreamLine,
}

impl ScriptOutputState {
    pub fn new(cap: usize) -> Self {
        Self {
            buffer: LineBuffer::new(cap),
            run_id: None,
            stdout: StreamLine::default(),
            stderr: StreamLine::default(),
        }
    }

    pub fn begin_run(&mut self, run_id: u64) {
        self.clear();
        self.run_id = Some(run_id);
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.stdout = StreamLine::default();
        self.stderr = StreamLine::default();
        self.run_id = None;
    }

    pub fn push_chunk(&mut self, stream: OutputStream, bytes: &[u8]) {
        match stream {
            OutputStream::Stdout => self.stdout.push(bytes, &mut self.buffer),
            OutputStream::Stderr => self.stderr.push(bytes, &mut self.buffer),
        }
    }

    pub fn push_exit(&mut self, code: Option<i32>) {
        self.stdout.flush(&mut self.buffer);
        self.stderr.flush(&mut self.buffer);
        let line = match code {
            Some(code) => format!("Update process finished with exit code {}", code),
            None => "Update process terminated by a signal".to_string(),
        };
        self.buffer.push_line(line);
    }

    pub fn push_notice(&mut self, text: &str) {
        self.buffer.push_line(text.to_string());
    }

    /// Last `n` lines, with any unterminated stdout then stderr line last.
    pub fn tail(&self, n: usize) -> Vec<&str> {
        let partials: Vec<&str> = [&self.stdout, &self.stderr]
            .into_iter()
            .map(|s| s.current.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        let keep = partials.len().min(n);
        let mut out = self.buffer.tail(n - keep);
        out.extend_from_slice(&partials[partials.len() - keep..]);
        out
    }
}
