//! Text primitives for status messages.

use std::time::Duration;

/// Default number of cells in a progress bar.
pub const DEFAULT_BAR_WIDTH: usize = 15;

/// Spinner animation frames.
pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Renders `[████░░░…]` scaled linearly to `percent`.
///
/// `None` (unknown total) renders an empty bar.
pub fn progress_bar(percent: Option<u8>, width: usize) -> String {
    let filled = percent.map_or(0, |p| width * usize::from(p.min(100)) / 100);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// `"42%"`, or `"Unknown"` without a total.
pub fn percent_label(percent: Option<u8>) -> String {
    match percent {
        Some(p) => format!("{p}%"),
        None => "Unknown".to_string(),
    }
}

/// Human-readable size with two decimals, binary multiples.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in SIZE_UNITS {
        if value < 1024.0 {
            return format!("{value:.2} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.2} PB")
}

/// Like [`format_size`], but an absent or zero size reads `"Unknown"`.
pub fn format_size_or_unknown(bytes: Option<u64>) -> String {
    match bytes {
        Some(n) if n > 0 => format_size(n),
        _ => "Unknown".to_string(),
    }
}

/// `"12.50 MB/s"`.
pub fn format_rate(bytes_per_second: f64) -> String {
    format!("{}/s", format_size(bytes_per_second.max(0.0) as u64))
}

/// Elapsed time as `mm:ss`; minutes keep growing past an hour.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_scales_linearly() {
        assert_eq!(progress_bar(Some(0), 15), format!("[{}]", "░".repeat(15)));
        assert_eq!(progress_bar(Some(100), 15), format!("[{}]", "█".repeat(15)));
        assert_eq!(
            progress_bar(Some(50), 15),
            format!("[{}{}]", "█".repeat(7), "░".repeat(8))
        );
        assert_eq!(progress_bar(Some(50), 10), "[█████░░░░░]");
    }

    #[test]
    fn bar_unknown_is_empty() {
        assert_eq!(progress_bar(None, DEFAULT_BAR_WIDTH), progress_bar(Some(0), 15));
        assert_eq!(percent_label(None), "Unknown");
        assert_eq!(percent_label(Some(8)), "8%");
    }

    #[test]
    fn bar_clamps_overflow() {
        assert_eq!(progress_bar(Some(250), 4), "[████]");
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.00 GB");
        assert_eq!(format_size(3 * 1024u64.pow(4)), "3.00 TB");
        assert_eq!(format_size(5 * 1024u64.pow(5)), "5.00 PB");
    }

    #[test]
    fn unknown_sizes() {
        assert_eq!(format_size_or_unknown(None), "Unknown");
        assert_eq!(format_size_or_unknown(Some(0)), "Unknown");
        assert_eq!(format_size_or_unknown(Some(2048)), "2.00 KB");
    }

    #[test]
    fn rates() {
        assert_eq!(format_rate(1024.0 * 1024.0 * 1.5), "1.50 MB/s");
        assert_eq!(format_rate(-3.0), "0.00 B/s");
    }

    #[test]
    fn elapsed_clock() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "01:05");
        assert_eq!(format_elapsed(Duration::from_millis(59_999)), "00:59");
        assert_eq!(format_elapsed(Duration::from_secs(7200)), "120:00");
    }

    #[test]
    fn spinner_cycles() {
        assert_eq!(spinner_frame(0), "⠋");
        assert_eq!(spinner_frame(9), "⠏");
        assert_eq!(spinner_frame(10), "⠋");
    }
}
