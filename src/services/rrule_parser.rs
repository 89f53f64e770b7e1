use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::recurring_task::{CustomPattern, Frequency, RecurrenceRule};
use crate::services::recurrence_engine;

/// Two-letter RFC 5545 weekday codes indexed 0 = Sunday.
const WEEKDAY_CODES: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];
const WORKWEEK: [u32; 5] = [1, 2, 3, 4, 5];
const WEEKEND: [u32; 2] = [0, 6];

/// A BYDAY entry such as `MO`, `2TU` or `-1FR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ByDayEntry {
    weekday: u32,
    position: Option<i32>,
}

/// Converts between iCalendar RRULE text and [`RecurrenceRule`].
///
/// Only the subset the recurrence engine can evaluate is accepted: `FREQ`,
/// `INTERVAL`, `UNTIL`, `BYDAY`, a single `BYMONTHDAY` and a single `BYMONTH`.
pub struct RRuleParser;

impl RRuleParser {
    pub fn parse(rrule: &str) -> AppResult<RecurrenceRule> {
        let body = rrule.trim();
        let body = body
            .strip_prefix("RRULE:")
            .or_else(|| body.strip_prefix("rrule:"))
            .unwrap_or(body);

        if body.is_empty() {
            return Err(AppError::validation("RRULE string cannot be empty"));
        }

        let params = Self::split_params(body)?;

        let freq = params
            .get("FREQ")
            .ok_or_else(|| AppError::validation("FREQ parameter is required"))?;
        let mut rule = match freq.to_ascii_uppercase().as_str() {
            "DAILY" => RecurrenceRule::daily(),
            "WEEKLY" => RecurrenceRule::new(Frequency::Weekly),
            "MONTHLY" => RecurrenceRule::new(Frequency::Monthly),
            "YEARLY" => RecurrenceRule::new(Frequency::Yearly),
            other => {
                return Err(AppError::validation(format!(
                    "unsupported RRULE frequency: {other}"
                )))
            }
        };

        if let Some(interval) = params.get("INTERVAL") {
            rule.interval = interval
                .parse::<i32>()
                .map_err(|_| AppError::validation(format!("invalid INTERVAL value: {interval}")))?;
        }

        if let Some(until) = params.get("UNTIL") {
            rule.end_date = Some(Self::parse_until(until)?);
        }

        if let Some(month_day) = params.get("BYMONTHDAY") {
            rule.day_of_month = Some(Self::parse_single(month_day, "BYMONTHDAY")?);
        }

        if let Some(month) = params.get("BYMONTH") {
            let month: i32 = Self::parse_single(month, "BYMONTH")?;
            rule.month = u32::try_from(month).ok();
            if rule.month.is_none() {
                return Err(AppError::validation(format!("invalid BYMONTH value: {month}")));
            }
        }

        if let Some(by_day) = params.get("BYDAY") {
            let entries = Self::parse_by_day(by_day)?;
            rule = Self::apply_by_day(rule, &entries)?;
        }

        let validation = recurrence_engine::validate_rule(&rule);
        if !validation.is_valid {
            return Err(AppError::validation_with_details(
                format!("RRULE does not describe a usable rule: {rrule}"),
                json!({"errors": validation.errors}),
            ));
        }

        Ok(rule)
    }

    /// Render a rule as RRULE text. Returns `None` for rules with no RRULE
    /// equivalent. `start_date` is not part of RRULE and is dropped.
    pub fn to_rrule_string(rule: &RecurrenceRule) -> Option<String> {
        let mut parts = match &rule.frequency {
            Frequency::Daily => vec!["FREQ=DAILY".to_string()],
            Frequency::Weekly => {
                let days = rule.days_of_week.as_deref()?;
                vec![
                    "FREQ=WEEKLY".to_string(),
                    format!("BYDAY={}", Self::format_days(days)?),
                ]
            }
            Frequency::Monthly => vec![
                "FREQ=MONTHLY".to_string(),
                format!("BYMONTHDAY={}", rule.day_of_month?),
            ],
            Frequency::Yearly => vec![
                "FREQ=YEARLY".to_string(),
                format!("BYMONTH={}", rule.month?),
                format!("BYMONTHDAY={}", rule.day_of_month?),
            ],
            Frequency::Custom => match rule.custom_pattern.as_ref()? {
                CustomPattern::Weekdays => vec![
                    "FREQ=DAILY".to_string(),
                    format!("BYDAY={}", Self::format_days(&WORKWEEK)?),
                ],
                CustomPattern::Weekends => vec![
                    "FREQ=DAILY".to_string(),
                    format!("BYDAY={}", Self::format_days(&WEEKEND)?),
                ],
                CustomPattern::NthWeekday { n, weekday } => vec![
                    "FREQ=MONTHLY".to_string(),
                    format!("BYDAY={n}{}", WEEKDAY_CODES.get(*weekday as usize)?),
                ],
            },
            Frequency::None | Frequency::Unknown(_) => return None,
        };

        if rule.interval != 1 && !matches!(rule.frequency, Frequency::Custom) {
            parts.insert(1, format!("INTERVAL={}", rule.interval));
        }
        if let Some(end) = rule.end_date {
            parts.push(format!("UNTIL={}", end.format("%Y%m%d")));
        }

        Some(parts.join(";"))
    }

    fn split_params(body: &str) -> AppResult<HashMap<String, String>> {
        let mut params = HashMap::new();
        for part in body.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| AppError::validation(format!("invalid RRULE part: {part}")))?;
            let key = key.trim().to_ascii_uppercase();
            match key.as_str() {
                "FREQ" | "INTERVAL" | "UNTIL" | "BYDAY" | "BYMONTHDAY" | "BYMONTH" => {}
                "WKST" => continue,
                "COUNT" => {
                    return Err(AppError::validation(
                        "COUNT is not supported, use UNTIL to bound the rule",
                    ))
                }
                other => {
                    return Err(AppError::validation(format!(
                        "unsupported RRULE parameter: {other}"
                    )))
                }
            }
            params.insert(key, value.trim().to_string());
        }
        Ok(params)
    }

    /// Accepts `YYYYMMDD` and `YYYYMMDDTHHMMSS[Z]`; only the date is kept.
    fn parse_until(value: &str) -> AppResult<NaiveDate> {
        let date_part = value.get(..8).unwrap_or(value);
        NaiveDate::parse_from_str(date_part, "%Y%m%d")
            .map_err(|_| AppError::validation(format!("invalid UNTIL value: {value}")))
    }

    fn parse_single(value: &str, name: &str) -> AppResult<i32> {
        if value.contains(',') {
            return Err(AppError::validation(format!(
                "{name} supports a single value, got {value}"
            )));
        }
        value
            .trim()
            .parse::<i32>()
            .map_err(|_| AppError::validation(format!("invalid {name} value: {value}")))
    }

    fn parse_by_day(value: &str) -> AppResult<Vec<ByDayEntry>> {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                if entry.len() < 2 || !entry.is_char_boundary(entry.len() - 2) {
                    return Err(AppError::validation(format!("invalid BYDAY entry: {entry}")));
                }
                let (position, code) = entry.split_at(entry.len() - 2);
                let code = code.to_ascii_uppercase();
                let weekday = WEEKDAY_CODES
                    .iter()
                    .position(|candidate| *candidate == code)
                    .ok_or_else(|| AppError::validation(format!("invalid weekday: {code}")))?;
                let position = if position.is_empty() {
                    None
                } else {
                    Some(position.trim_start_matches('+').parse::<i32>().map_err(|_| {
                        AppError::validation(format!("invalid BYDAY position: {entry}"))
                    })?)
                };
                Ok(ByDayEntry {
                    weekday: weekday as u32,
                    position,
                })
            })
            .collect()
    }

    fn apply_by_day(mut rule: RecurrenceRule, entries: &[ByDayEntry]) -> AppResult<RecurrenceRule> {
        if entries.is_empty() {
            return Err(AppError::validation("BYDAY cannot be empty"));
        }

        if let [ByDayEntry {
            weekday,
            position: Some(n),
        }] = entries
        {
            if rule.frequency != Frequency::Monthly || rule.day_of_month.is_some() {
                return Err(AppError::validation(
                    "positional BYDAY is only supported on MONTHLY rules without BYMONTHDAY",
                ));
            }
            rule.frequency = Frequency::Custom;
            rule.custom_pattern = Some(CustomPattern::NthWeekday {
                n: *n,
                weekday: *weekday,
            });
            return Ok(rule);
        }

        if entries.iter().any(|entry| entry.position.is_some()) {
            return Err(AppError::validation(
                "only a single positional BYDAY entry is supported",
            ));
        }

        let mut days: Vec<u32> = entries.iter().map(|entry| entry.weekday).collect();
        days.sort_unstable();
        days.dedup();

        match rule.frequency {
            Frequency::Daily if rule.interval == 1 && days == WORKWEEK => {
                rule.frequency = Frequency::Custom;
                rule.custom_pattern = Some(CustomPattern::Weekdays);
            }
            Frequency::Daily if rule.interval == 1 && days == WEEKEND => {
                rule.frequency = Frequency::Custom;
                rule.custom_pattern = Some(CustomPattern::Weekends);
            }
            Frequency::Daily | Frequency::Weekly => {
                rule.frequency = Frequency::Weekly;
                rule.days_of_week = Some(days);
            }
            _ => {
                return Err(AppError::validation(format!(
                    "BYDAY weekday lists are not supported on {} rules",
                    rule.frequency
                )))
            }
        }

        Ok(rule)
    }

    fn format_days(days: &[u32]) -> Option<String> {
        let codes = days
            .iter()
            .map(|day| WEEKDAY_CODES.get(*day as usize).copied())
            .collect::<Option<Vec<_>>>()?;
        Some(codes.join(","))
    }
}
