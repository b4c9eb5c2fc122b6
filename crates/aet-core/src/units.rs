//! Speed and pace conversions.
//!
//! Speeds are meters per second. Paces are decimal minutes per mile, so
//! `10.25` means ten minutes and fifteen seconds per mile.

/// Meters in one statute mile.
pub const METERS_PER_MILE: f64 = 1609.34;

const SECONDS_PER_MINUTE: f64 = 60.0;

/// Converts a speed in m/s into a pace in decimal minutes per mile.
///
/// A zero speed has no pace and returns exactly `0.0`. Negative speeds are a
/// caller error and are not checked.
pub fn speed_to_pace_min_per_mile(speed_m_s: f64) -> f64 {
    let miles_per_minute = speed_m_s / METERS_PER_MILE * SECONDS_PER_MINUTE;
    if miles_per_minute == 0.0 {
        0.0
    } else {
        1.0 / miles_per_minute
    }
}

/// Converts a pace in decimal minutes per mile into a speed in m/s.
///
/// The caller must not pass a zero pace.
pub fn pace_to_speed_m_per_s(pace_min_per_mile: f64) -> f64 {
    let seconds_per_meter = pace_min_per_mile * SECONDS_PER_MINUTE / METERS_PER_MILE;
    1.0 / seconds_per_meter
}

/// Formats a decimal minutes-per-mile pace as `MM:SS`.
///
/// The pace is rounded to whole seconds, half away from zero, before being
/// split, so a pace never renders with `60` seconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_pace(pace_min_per_mile: f64) -> String {
    if pace_min_per_mile == 0.0 || !pace_min_per_mile.is_finite() {
        return "00:00".to_string();
    }
    let total_seconds = (pace_min_per_mile.abs() * SECONDS_PER_MINUTE).round() as u64;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{minutes:02}:{seconds:02}")
}
