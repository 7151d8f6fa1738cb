use std::io::{self, Write};
use crossterm::{queue, style::{Color, SetForegroundColor, ResetColor}};

use crate::model::MetricSample;
use super::shared::{format_percent, format_rate, format_temperature, load_color, progress_bar, writeln};

/// Rows taken by the metrics block, separator included.
pub const METRICS_HEIGHT: u16 = 4;

const BAR_WIDTH: usize = 20;

pub fn render_metrics(out: &mut impl Write, sample: Option<&MetricSample>, width: u16) -> io::Result<()> {
    let Some(sample) = sample else {
        writeln(out, "CPU    collecting...")?;
        writeln(out, "MEM    collecting...")?;
        writeln(out, "DISK   collecting...")?;
        return write_separator(out, width);
    };

    let cpu = sample.cpu_percent.or_zero();
    writeln(out, &format!(
        "CPU    {}{}\x1b[0m {}  │ temp: {}",
        load_color(cpu),
        progress_bar(cpu, BAR_WIDTH),
        format_percent(&sample.cpu_percent),
        format_temperature(&sample.cpu_temperature_celsius),
    ))?;

    let mem = sample.memory_percent.or_zero();
    writeln(out, &format!(
        "MEM    {}{}\x1b[0m {}",
        load_color(mem),
        progress_bar(mem, BAR_WIDTH),
        format_percent(&sample.memory_percent),
    ))?;

    writeln(out, &format!(
        "DISK   read: {:>12}  │ write: {:>12}",
        format_rate(&sample.disk_read_rate_kb_per_s),
        format_rate(&sample.disk_write_rate_kb_per_s),
    ))?;

    write_separator(out, width)
}

fn write_separator(out: &mut impl Write, width: u16) -> io::Result<()> {
    queue!(out, SetForegroundColor(Color::DarkGrey))?;
    writeln(out, &"─".repeat(width as usize))?;
    queue!(out, ResetColor)?;
    Ok(())
}
