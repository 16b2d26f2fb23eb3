use std::fmt::Write;
use std::time::Duration;

use crate::error::AppError;

/// Parse a time span with an optional unit (s, m, h) into seconds.
pub fn parse_time(time_str: &str) -> Result<f64, AppError> {
    let time_str = time_str.trim();
    if time_str.is_empty() {
        return Err(AppError::ParseError("Invalid format: empty string".to_string()));
    }

    // Plain number means seconds
    if let Ok(seconds) = time_str.parse::<f64>() {
        return Ok(seconds);
    }

    let split_index = time_str
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(time_str.len());
    let (numeric_part, unit_part) = time_str.split_at(split_index);

    let value = numeric_part
        .parse::<f64>()
        .map_err(|_| AppError::ParseError(format!("Invalid number in '{time_str}'")))?;

    match unit_part.trim().to_lowercase().as_str() {
        "s" => Ok(value),
        "m" => Ok(value * 60.0),
        "h" => Ok(value * 3600.0),
        other => Err(AppError::ParseError(format!("Invalid time unit '{other}'"))),
    }
}

/// Parse a time span into a [`Duration`], rejecting negative and non-finite values.
pub fn parse_duration(time_str: &str) -> Result<Duration, AppError> {
    let seconds = parse_time(time_str)?;
    Duration::try_from_secs_f64(seconds)
        .map_err(|_| AppError::ParseError(format!("Invalid duration '{time_str}'")))
}

/// Convert a duration to a human-readable format
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs_f64();
    let mut result = String::with_capacity(10);

    // Writing to a String cannot fail
    let _ = if seconds >= 3600.0 {
        write!(result, "{:.2}h", seconds / 3600.0)
    } else if seconds >= 60.0 {
        write!(result, "{:.2}m", seconds / 60.0)
    } else {
        write!(result, "{seconds:.2}s")
    };

    result
}
