mod shared;
mod tab_bar;
mod metrics;
mod pane;
mod confirmation;

use std::io::{self, Write};
use crossterm::{cursor, queue, style::{Color, SetForegroundColor, ResetColor}, terminal};

use crate::model::{MetricSample, Pane};

pub use metrics::METRICS_HEIGHT;
pub use shared::{format_percent, format_rate, format_temperature, safe_truncate};
pub use tab_bar::help_text;

pub struct Presenter;

/// Minimum terminal dimensions for usable rendering.
pub const MIN_COLS: u16 = 60;
pub const MIN_ROWS: u16 = 16;

/// Rows of the tab bar and its separator.
pub const HEADER_HEIGHT: u16 = 2;

/// Row budget for the two output panes below the metrics block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaneLayout {
    pub update_height: u16,
    pub terminal_height: u16,
    pub help_row: u16,
}

impl PaneLayout {
    /// Split what is left of `rows` after the header, metrics and help bar;
    /// the terminal pane gets the larger half.
    pub fn for_size(rows: u16) -> Self {
        let body = rows.saturating_sub(HEADER_HEIGHT + METRICS_HEIGHT + 1);
        let update_height = body / 2;
        Self {
            update_height,
            terminal_height: body - update_height,
            help_row: rows.saturating_sub(1),
        }
    }

    /// Text rows of the terminal pane, used to size the pty.
    pub fn terminal_rows(&self) -> u16 {
        self.terminal_height.saturating_sub(1).max(1)
    }
}

impl Presenter {
    /// Check if the terminal is large enough. If not, render a "too small"
    /// message and return `true` (meaning "skip normal rendering").
    pub fn render_size_guard(out: &mut impl Write) -> io::Result<bool> {
        let (cols, rows) = terminal::size()?;
        if cols < MIN_COLS || rows < MIN_ROWS {
            queue!(out, terminal::Clear(terminal::ClearType::All), cursor::MoveTo(0, 0))?;
            let msg = format!(
                "Terminal too small ({}x{}). Resize to at least {}x{}.",
                cols, rows, MIN_COLS, MIN_ROWS
            );
            let y = rows / 2;
            let x = cols.saturating_sub(msg.len() as u16) / 2;
            queue!(out, cursor::MoveTo(x, y), SetForegroundColor(Color::Yellow))?;
            write!(out, "{}", msg)?;
            queue!(out, ResetColor)?;
            out.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn render_tab_bar(out: &mut impl Write, focus: Pane, time: &str, width: u16) -> io::Result<()> {
        tab_bar::render_tab_bar(out, focus, time, width)
    }

    pub fn render_metrics(out: &mut impl Write, sample: Option<&MetricSample>, width: u16) -> io::Result<()> {
        metrics::render_metrics(out, sample, width)
    }

    pub fn render_pane(
        out: &mut impl Write,
        title: &str,
        lines: &[&str],
        focused: bool,
        width: u16,
        height: u16,
    ) -> io::Result<()> {
        pane::render_pane(out, title, lines, focused, width, height)
    }

    pub fn render_help_bar(
        out: &mut impl Write,
        focus: Pane,
        update_running: bool,
        status: Option<&str>,
        width: u16,
        y: u16,
    ) -> io::Result<()> {
        tab_bar::render_help_bar(out, focus, update_running, status, width, y)
    }

    pub fn render_confirmation(out: &mut impl Write, prompt: &str, width: u16, height: u16) -> io::Result<()> {
        confirmation::render_confirmation(out, prompt, width, height)
    }
}
