use std::io::{self, Write};

use crossterm::{cursor::MoveTo, queue, terminal::{self, Clear, ClearType}};

use crate::model::Pane;
use crate::view::{PaneLayout, Presenter};

use super::App;

pub fn render(app: &App, out: &mut impl Write) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    draw(app, out, cols, rows)
}

/// Draw one full frame for a `cols` x `rows` screen.
pub fn draw(app: &App, out: &mut impl Write, cols: u16, rows: u16) -> io::Result<()> {
    let layout = PaneLayout::for_size(rows);
    let sample = app.sampler.latest();
    let time = sample.map(|s| s.time.as_str()).unwrap_or("...");

    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
    Presenter::render_tab_bar(out, app.focus, time, cols)?;
    Presenter::render_metrics(out, sample, cols)?;

    let update_title = match (app.script_runner.is_running(), app.script_output.run_id) {
        (true, Some(id)) => format!("Update (run {} in progress)", id),
        (false, Some(id)) => format!("Update (run {})", id),
        _ => "Update".to_string(),
    };
    let update_lines = app.script_output.tail(layout.update_height as usize);
    Presenter::render_pane(
        out,
        &update_title,
        &update_lines,
        app.focus == Pane::Update,
        cols,
        layout.update_height,
    )?;

    let terminal_title = match &app.terminal {
        Some(session) if session.is_alive() => format!("Terminal ({})", app.config.shell),
        Some(_) => "Terminal (exited)".to_string(),
        None => "Terminal (unavailable)".to_string(),
    };
    let terminal_lines = app.terminal_buffer.tail(layout.terminal_height as usize);
    Presenter::render_pane(
        out,
        &terminal_title,
        &terminal_lines,
        app.focus == Pane::Terminal,
        cols,
        layout.terminal_height,
    )?;

    Presenter::render_help_bar(
        out,
        app.focus,
        app.script_runner.is_running(),
        app.status_message.as_deref(),
        cols,
        layout.help_row,
    )?;

    if let Some(ref pa) = app.pending_action {
        Presenter::render_confirmation(out, &pa.description, cols, rows)?;
    }
    Ok(())
}
