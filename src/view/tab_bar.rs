use std::io::{self, Write};
use crossterm::{
    cursor, queue,
    style::{Color, SetForegroundColor, SetBackgroundColor, ResetColor},
};

use crate::model::Pane;

pub fn render_tab_bar(out: &mut impl Write, focus: Pane, time: &str, width: u16) -> io::Result<()> {
    write!(out, "  ")?;

    for (pane, label) in [(Pane::Update, " Update "), (Pane::Terminal, " Terminal ")] {
        if pane == focus {
            queue!(out, SetBackgroundColor(Color::DarkBlue), SetForegroundColor(Color::White))?;
        } else {
            queue!(out, SetForegroundColor(Color::DarkGrey))?;
        }
        write!(out, "{}", label)?;
        queue!(out, ResetColor)?;
        write!(out, "  ")?;
    }

    // Right-align the time
    let time_str = format!("rkmon - {} ", time);
    let col = (width as usize).saturating_sub(time_str.chars().count());
    queue!(out, cursor::MoveToColumn(col as u16), SetForegroundColor(Color::DarkGrey))?;
    write!(out, "{}", time_str)?;
    queue!(out, ResetColor)?;

    write!(out, "\r\n")?;
    let sep: String = "─".repeat(width as usize);
    queue!(out, SetForegroundColor(Color::DarkGrey))?;
    write!(out, "{}\r\n", sep)?;
    queue!(out, ResetColor)?;

    Ok(())
}

pub fn help_text(focus: Pane, update_running: bool) -> String {
    let update = if update_running { "F2: Update (running)" } else { "F2: Update" };
    match focus {
        Pane::Update => format!("F10: Quit | Ctrl+C: Quit | F6: Terminal | {} | c: Clear output", update),
        Pane::Terminal => format!("F10: Quit | F6: Update pane | {} | keys go to the shell", update),
    }
}

pub fn render_help_bar(
    out: &mut impl Write,
    focus: Pane,
    update_running: bool,
    status: Option<&str>,
    width: u16,
    y: u16,
) -> io::Result<()> {
    let text = match status {
        Some(status) => format!("{} | {}", status, help_text(focus, update_running)),
        None => help_text(focus, update_running),
    };
    let text = super::shared::safe_truncate(&text, (width as usize).saturating_sub(1));
    queue!(out, cursor::MoveTo(1, y), SetForegroundColor(Color::DarkGrey))?;
    write!(out, "{:<width$}", text, width = (width as usize).saturating_sub(1))?;
    queue!(out, ResetColor)?;
    Ok(())
}
