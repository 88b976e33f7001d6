mod parser;

use chrono::{DateTime, FixedOffset, NaiveDate};
use combine::Parser;

/// Parses an ISO 8601 like timestamp as reported by `rclone lsjson`.
///
/// Different from `DateTime::parse_from_rfc3339`, this in addition accepts
/// some variants seen from remotes and from hand-written input:
/// * a space or lowercase `t` between date and time,
/// * omitting the seconds, or the fraction of a second,
/// * more than nine fractional digits (extra digits are dropped),
/// * `+HHMM` offsets without the colon, and
/// * no offset at all, which is treated as UTC.
///
/// This function only accepts a complete timestamp string.
pub fn parse_datetime(s: &[u8]) -> Option<DateTime<FixedOffset>> {
    match parser::date_time().parse(s) {
        Ok((dt, rest)) if rest.is_empty() => Some(dt),
        _ => None,
    }
}

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(s: &[u8]) -> Option<NaiveDate> {
    match parser::date().parse(s) {
        Ok((date, rest)) if rest.is_empty() => Some(date),
        _ => None,
    }
}
