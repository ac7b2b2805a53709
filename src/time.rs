// src/time.rs

use chrono::{DateTime, FixedOffset};

/// Layout of the access log's `time_local` field, e.g.
/// `2/Jan/2006:15:04:05 +0000`. The day of month is unpadded; chrono
/// accepts that when parsing `%d`.
pub const TIME_LOCAL_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

pub fn parse_time_local(raw: &str) -> chrono::ParseResult<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw, TIME_LOCAL_FORMAT)
}
