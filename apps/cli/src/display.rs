//! Terminal formatting for sizes, rates and progress lines.

use std::time::Duration;

/// Formats a byte count with binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.2} {}", UNITS[unit])
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// One progress line: percentage, bytes, rate and ETA.
pub fn progress_line(
    fraction: f64,
    uploaded: u64,
    total: u64,
    bytes_per_second: f64,
    eta: Option<Duration>,
) -> String {
    let eta = eta.map(format_duration).unwrap_or_else(|| "--".into());
    format!(
        "{:5.1}%  {} / {}  {}/s  eta {}",
        fraction * 100.0,
        format_bytes(uploaded),
        format_bytes(total),
        format_bytes(bytes_per_second as u64),
        eta
    )
}
