use std::io::{self, Write};
use crossterm::{queue, style::{Color, SetForegroundColor, SetBackgroundColor, ResetColor, SetAttribute, Attribute}};

use super::shared::safe_truncate;

/// Draw a titled pane of `height` rows showing the last lines of output.
pub fn render_pane(
    out: &mut impl Write,
    title: &str,
    lines: &[&str],
    focused: bool,
    width: u16,
    height: u16,
) -> io::Result<()> {
    if height == 0 {
        return Ok(());
    }
    let width = width as usize;

    if focused {
        queue!(out, SetBackgroundColor(Color::DarkBlue), SetForegroundColor(Color::White))?;
    } else {
        queue!(out, SetAttribute(Attribute::Bold))?;
    }
    let header = format!("  {}", title);
    write!(out, "{:<width$}\r\n", safe_truncate(&header, width), width = width)?;
    queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;

    let area = height as usize - 1;
    let start = lines.len().saturating_sub(area);
    let mut printed = 0;
    for line in &lines[start..] {
        write!(out, "{}\r\n", safe_truncate(line, width))?;
        printed += 1;
    }
    for _ in printed..area {
        write!(out, "\r\n")?;
    }
    Ok(())
}
