//! Timestamp and reporting-period utilities

use chrono::{DateTime, Datelike, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Last month included in a year-to-date window
///
/// The running month is still being entered, so for the current year the
/// window stops at the previous month (never before January). Past years
/// are complete and use December.
pub fn default_ytd_month(year: i32, today: DateTime<Utc>) -> u32 {
    if year == today.year() {
        today.month().saturating_sub(1).max(1)
    } else {
        12
    }
}

/// Validate a month number (1-12)
pub fn is_valid_month(month: u32) -> bool {
    (1..=12).contains(&month)
}
