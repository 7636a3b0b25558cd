// Due date / due time formatting
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike};

// Matches "EEE, d MMM yyyy", e.g. "Fri, 15 Mar 2024"
pub const DUE_DATE_FORMAT: &str = "%a, %-d %b %Y";

// Format accepted by the terminal date prompt
pub const DATE_INPUT_FORMAT: &str = "%d.%m.%Y";

/// Formats the calendar day a date picker selected.
///
/// Pickers hand back UTC midnight of the chosen day, so the day is read in
/// UTC and the local offset never shifts it. Returns `None` for instants
/// chrono cannot represent.
pub fn format_due_date(epoch_millis: i64) -> Option<String> {
    DateTime::from_timestamp_millis(epoch_millis)
        .map(|instant| instant.date_naive().format(DUE_DATE_FORMAT).to_string())
}

/// Formats a picked time as zero-padded 24-hour `HH:mm`.
pub fn format_due_time(hour: u32, minute: u32) -> String {
    format!("{:02}:{:02}", hour, minute)
}

// Parse "dd.mm.yyyy" into the epoch millis a picker would report for that day
pub fn parse_date_input(input: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(input.trim(), DATE_INPUT_FORMAT).ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

// Parse "HH:MM" into (hour, minute)
pub fn parse_time_input(input: &str) -> Option<(u32, u32)> {
    let time = NaiveTime::parse_from_str(input.trim(), "%H:%M").ok()?;
    Some((time.hour(), time.minute()))
}
