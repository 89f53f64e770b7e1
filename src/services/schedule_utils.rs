use chrono::{NaiveTime, Timelike};
use serde_json::json;

use crate::error::{AppError, AppResult};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse a wall-clock `HH:MM` (or `HH:MM:SS`) string into minutes from
/// midnight. `24:00` is accepted as the end of the day.
pub fn time_string_to_minutes(value: &str) -> AppResult<u32> {
    let trimmed = value.trim();
    if trimmed == "24:00" {
        return Ok(MINUTES_PER_DAY);
    }

    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map(minutes_from_midnight)
        .map_err(|err| AppError::invalid_time(value, err.to_string()))
}

pub fn minutes_to_time_string(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn minutes_from_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Half-open interval intersection test.
pub fn has_time_overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn overlap_minutes(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> u32 {
    if has_time_overlap(a_start, a_end, b_start, b_end) {
        a_end.min(b_end) - a_start.max(b_start)
    } else {
        0
    }
}

pub fn ensure_window(start: u32, end: u32) -> AppResult<()> {
    if end <= start {
        Err(AppError::validation_with_details(
            "window end must be later than its start",
            json!({"start": minutes_to_time_string(start), "end": minutes_to_time_string(end)}),
        ))
    } else {
        Ok(())
    }
}
