// Human-readable sizes and durations for log output

const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

/// `1536` -> `"1.50 KB"`; base 1024, capped at PB
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, UNITS[unit])
}

/// Transfer rate, e.g. `"1.50 KB/s"`
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// The two largest non-zero units, e.g. `"2h 5m"`; negative means unknown
pub fn format_duration(seconds: i64) -> String {
    if seconds < 0 {
        return "∞".to_string();
    }

    let parts = [
        (seconds / 86_400, "d"),
        ((seconds % 86_400) / 3_600, "h"),
        ((seconds % 3_600) / 60, "m"),
        (seconds % 60, "s"),
    ];

    let shown: Vec<String> = parts
        .iter()
        .skip_while(|(value, _)| *value == 0)
        .take(2)
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect();

    if shown.is_empty() {
        "0s".to_string()
    } else {
        shown.join(" ")
    }
}
