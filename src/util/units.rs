//! Units formatting utilities
//!
//! Human-readable durations, thousands-separated counts, rates and the
//! proportional text progress bar used by the reporter.

use std::time::Duration;

use indicatif::HumanCount;

/// Default width of the progress bar in cells
pub const BAR_WIDTH: usize = 20;

/// Format whole seconds as hours, minutes and seconds
///
/// # Examples
/// ```
/// use npuload::util::units::format_duration;
///
/// assert_eq!(format_duration(3723.9), "1h 2m 3s");
/// assert_eq!(format_duration(45.0), "45s");
/// ```
pub fn format_duration(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    humantime::format_duration(Duration::from_secs(whole)).to_string()
}

/// Format a count with thousands separators
///
/// # Examples
/// ```
/// use npuload::util::units::format_count;
///
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
pub fn format_count(count: u64) -> String {
    HumanCount(count).to_string()
}

/// Format an operations-per-second rate with one decimal
pub fn format_rate(ops_per_second: f64) -> String {
    format!("{:.1} ops/sec", ops_per_second)
}

/// Fraction of `total` covered by `elapsed`, clamped to [0, 1].
///
/// A non-positive total counts as complete.
pub fn progress_fraction(elapsed: f64, total: f64) -> f64 {
    if total.is_nan() || total <= 0.0 {
        return 1.0;
    }
    (elapsed / total).clamp(0.0, 1.0)
}

/// Render `[█████░░░░░]  50%` for the given progress
pub fn progress_bar(elapsed: f64, total: f64, width: usize) -> String {
    let progress = progress_fraction(elapsed, total);
    let filled = ((progress * width as f64).floor() as usize).min(width);
    let percentage = (progress * 100.0).floor() as u32;
    format!(
        "[{}{}] {:>3}%",
        "█".repeat(filled),
        "░".repeat(width - filled),
        percentage
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0s");
        assert_eq!(format_duration(59.99), "59s");
        assert_eq!(format_duration(300.0), "5m");
        assert_eq!(format_duration(3723.0), "1h 2m 3s");
        assert_eq!(format_duration(-4.0), "0s");
        assert_eq!(format_duration(f64::NAN), "0s");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
    }

    #[test]
    fn test_progress_bar_fill() {
        assert_eq!(progress_bar(0.0, 10.0, 10), "[░░░░░░░░░░]   0%");
        assert_eq!(progress_bar(5.0, 10.0, 10), "[█████░░░░░]  50%");
        assert_eq!(progress_bar(9.99, 10.0, 10), "[█████████░]  99%");
        assert_eq!(progress_bar(25.0, 10.0, 10), "[██████████] 100%");
    }

    #[test]
    fn test_progress_bar_zero_total_is_complete() {
        assert_eq!(progress_bar(0.0, 0.0, 4), "[████] 100%");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(12.345), "12.3 ops/sec");
    }
}
