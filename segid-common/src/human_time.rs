//! Human-readable time formatting for logs and UI strings

/// Band limits, in the unit each band rounds to
const SHORT_FORMAT_MAX_HUNDREDTHS: f64 = 10_000.0; // < 100s → X.XXs
const MEDIUM_FORMAT_MAX_TENTHS: f64 = 36_000.0; // < 1h → M:SS.Xs

/// Format seconds with a format chosen by magnitude
///
/// - `X.XXs` below 100 seconds
/// - `M:SS.Xs` below one hour
/// - `H:MM:SS` otherwise
///
/// Values are rounded before the band is chosen, so a carry never produces
/// a `60` in the seconds or minutes field.
///
/// # Examples
///
/// ```
/// use segid_common::human_time::format_seconds;
///
/// assert_eq!(format_seconds(45.0), "45.00s");
/// assert_eq!(format_seconds(330.5), "5:30.5s");
/// assert_eq!(format_seconds(3661.0), "1:01:01");
/// ```
pub fn format_seconds(seconds: f64) -> String {
    let is_negative = seconds < 0.0;
    let abs_seconds = seconds.abs();

    let formatted = if (abs_seconds * 100.0).round() < SHORT_FORMAT_MAX_HUNDREDTHS {
        format!("{:.2}s", abs_seconds)
    } else if (abs_seconds * 10.0).round() < MEDIUM_FORMAT_MAX_TENTHS {
        let tenths = (abs_seconds * 10.0).round() as u64;
        format!(
            "{}:{:02}.{}s",
            tenths / 600,
            (tenths % 600) / 10,
            tenths % 10
        )
    } else {
        let whole = abs_seconds.round() as u64;
        format!(
            "{}:{:02}:{:02}",
            whole / 3600,
            (whole % 3600) / 60,
            whole % 60
        )
    };

    if is_negative {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Format a millisecond count
pub fn format_millis(millis: u64) -> String {
    format_seconds(millis as f64 / 1000.0)
}

/// Format a window range as `start-end`
pub fn format_range(start: f64, end: f64) -> String {
    format!("{}-{}", format_seconds(start), format_seconds(end))
}
