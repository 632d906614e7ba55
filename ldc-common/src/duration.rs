//! Human-readable duration parsing
//!
//! Search indexes report durations as clock strings. Two layouts are accepted:
//!
//! - `MM:SS` (e.g. `"4:05"`)
//! - `HH:MM:SS` (e.g. `"1:02:03"`)
//!
//! Some sources emit dotted durations (`"4.05"`), so `.` is accepted as a synonym for `:`.
//! Minutes and seconds are clock fields: one or two digits, below 60. Hours are one or two
//! digits, below 24.

use thiserror::Error;

/// Duration text did not match any accepted layout
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed duration {text:?}: {reason}")]
pub struct MalformedDurationError {
    /// The offending input, verbatim
    pub text: String,
    /// Which rule rejected it
    pub reason: &'static str,
}

impl MalformedDurationError {
    fn new(text: &str, reason: &'static str) -> Self {
        Self {
            text: text.to_string(),
            reason,
        }
    }
}

/// Parse `MM:SS` / `HH:MM:SS` (with `.` or `:` separators) into whole seconds
///
/// # Examples
///
/// ```
/// use ldc_common::duration::parse_duration;
///
/// assert_eq!(parse_duration("2:10").unwrap(), 130);
/// assert_eq!(parse_duration("6.05").unwrap(), 365);
/// assert_eq!(parse_duration("1:02:03").unwrap(), 3723);
/// assert!(parse_duration("LIVE").is_err());
/// ```
pub fn parse_duration(text: &str) -> Result<u64, MalformedDurationError> {
    let trimmed = text.trim();
    let fields: Vec<&str> = trimmed.split([':', '.']).collect();

    let (hours, minutes, seconds) = match fields.as_slice() {
        [m, s] => (0, clock_field(text, m)?, clock_field(text, s)?),
        [h, m, s] => (
            hour_field(text, h)?,
            clock_field(text, m)?,
            clock_field(text, s)?,
        ),
        _ => {
            return Err(MalformedDurationError::new(
                text,
                "expected MM:SS or HH:MM:SS",
            ))
        }
    };

    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(|| MalformedDurationError::new(text, "duration out of range"))
}

/// Format whole seconds as `M:SS` (under an hour) or `H:MM:SS`
///
/// ```
/// use ldc_common::duration::format_duration;
///
/// assert_eq!(format_duration(130), "2:10");
/// assert_eq!(format_duration(3723), "1:02:03");
/// ```
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

fn digits(text: &str, field: &str) -> Result<u64, MalformedDurationError> {
    if field.is_empty() {
        return Err(MalformedDurationError::new(text, "empty field"));
    }
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedDurationError::new(text, "non-numeric field"));
    }
    field
        .parse::<u64>()
        .map_err(|_| MalformedDurationError::new(text, "field out of range"))
}

fn clock_field(text: &str, field: &str) -> Result<u64, MalformedDurationError> {
    let value = digits(text, field)?;
    if field.len() > 2 {
        return Err(MalformedDurationError::new(text, "clock field longer than two digits"));
    }
    if value >= 60 {
        return Err(MalformedDurationError::new(text, "clock field must be below 60"));
    }
    Ok(value)
}

fn hour_field(text: &str, field: &str) -> Result<u64, MalformedDurationError> {
    let value = digits(text, field)?;
    if field.len() > 2 {
        return Err(MalformedDurationError::new(text, "hour field longer than two digits"));
    }
    if value >= 24 {
        return Err(MalformedDurationError::new(text, "hour field must be below 24"));
    }
    Ok(value)
}
