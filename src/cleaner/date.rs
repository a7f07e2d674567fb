//! Replacement-date parsing and formatting.

use chrono::{DateTime, FixedOffset};

use crate::error::{Result, ScrubError};

/// Format a timestamp as an RFC 5322 `Date` header value, keeping its
/// explicit UTC offset (e.g. `Fri, 11 Jul 2025 13:35:00 +0530`).
pub fn format_rfc5322(date: &DateTime<FixedOffset>) -> String {
    date.to_rfc2822()
}

/// Parse a user-supplied replacement date.
///
/// Accepts RFC 3339 (`2025-07-11T13:35:00+05:30`), RFC 2822
/// (`Fri, 11 Jul 2025 13:35:00 +0530`), and a space-separated variant of
/// the former. The offset is required; a date without one is ambiguous.
pub fn parse_date_arg(input: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt);
    }

    Err(ScrubError::InvalidDate(trimmed.to_string()))
}
