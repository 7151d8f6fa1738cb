use std::io::{self, Write};

use crate::model::Reading;

/// Truncate a string to at most `max_len` characters (not bytes). Safe for
/// multi-byte UTF-8.
pub fn safe_truncate(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

pub fn writeln(out: &mut impl Write, text: &str) -> io::Result<()> {
    write!(out, "{}\r\n", text)
}

pub fn progress_bar(percent: f64, width: usize) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

pub fn format_percent(reading: &Reading) -> String {
    match reading {
        Reading::Ok(v) => format!("{:5.1}%", v),
        Reading::Unavailable => "  N/A".to_string(),
        Reading::Invalid(_) | Reading::Failed(_) => "Error".to_string(),
    }
}

pub fn format_temperature(reading: &Reading) -> String {
    match reading {
        Reading::Ok(v) => format!("{:.1} °C", v),
        Reading::Unavailable => "N/A".to_string(),
        Reading::Invalid(_) | Reading::Failed(_) => "Error".to_string(),
    }
}

pub fn format_rate(reading: &Reading) -> String {
    match reading {
        Reading::Ok(v) if *v >= 1024.0 => format!("{:.2} MB/s", v / 1024.0),
        Reading::Ok(v) => format!("{:.1} KB/s", v),
        Reading::Unavailable => "N/A".to_string(),
        Reading::Invalid(_) | Reading::Failed(_) => "Error".to_string(),
    }
}

/// ANSI color prefix for a utilization bar.
pub fn load_color(percent: f64) -> &'static str {
    if percent > 85.0 {
        "\x1b[31m"
    } else if percent > 70.0 {
        "\x1b[33m"
    } else {
        ""
    }
}
