use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::debug;

use crate::models::recurring_task::{CustomPattern, Frequency, RecurrenceRule, RuleValidation};
use crate::models::task::TaskDefinition;

/// Upper bound on the forward scan performed by `get_next_occurrence`.
pub const DEFAULT_MAX_LOOKAHEAD_DAYS: u64 = 1000;

/// Decides which dates a task template produces an occurrence on.
#[derive(Debug, Clone, Copy)]
pub struct RecurrenceEngine {
    max_lookahead_days: u64,
}

impl Default for RecurrenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecurrenceEngine {
    pub fn new() -> Self {
        Self {
            max_lookahead_days: DEFAULT_MAX_LOOKAHEAD_DAYS,
        }
    }

    pub fn with_max_lookahead(max_lookahead_days: u64) -> Self {
        Self { max_lookahead_days }
    }

    pub fn max_lookahead_days(&self) -> u64 {
        self.max_lookahead_days
    }

    /// Inactive templates never generate, whatever their rule says.
    pub fn should_generate_for_date(&self, task: &TaskDefinition, date: NaiveDate) -> bool {
        task.is_active && rule_matches(&task.recurrence_rule, date)
    }

    /// First occurrence strictly after `from_date`, scanning at most the
    /// configured lookahead.
    pub fn get_next_occurrence(
        &self,
        task: &TaskDefinition,
        from_date: NaiveDate,
    ) -> Option<NaiveDate> {
        let rule = &task.recurrence_rule;
        if !task.is_active || matches!(rule.frequency, Frequency::None | Frequency::Unknown(_)) {
            return None;
        }

        for offset in 1..=self.max_lookahead_days {
            let candidate = from_date.checked_add_days(Days::new(offset))?;
            if rule.end_date.is_some_and(|end| candidate > end) {
                break;
            }
            if rule_matches(rule, candidate) {
                return Some(candidate);
            }
        }

        debug!(
            target: "app::recurrence",
            task_id = %task.id,
            %from_date,
            lookahead = self.max_lookahead_days,
            "no occurrence found within lookahead"
        );
        None
    }

    /// All occurrences in `[start, end]`, ascending.
    pub fn get_occurrences_in_range(
        &self,
        task: &TaskDefinition,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<NaiveDate> {
        if !task.is_active || end < start {
            return Vec::new();
        }
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .filter(|date| rule_matches(&task.recurrence_rule, *date))
            .collect()
    }

    pub fn validate_recurrence_rule(&self, rule: &RecurrenceRule) -> RuleValidation {
        validate_rule(rule)
    }
}

/// Whether `rule` fires on `date`.
pub fn rule_matches(rule: &RecurrenceRule, date: NaiveDate) -> bool {
    if rule.start_date.is_some_and(|start| date < start) {
        return false;
    }
    if rule.end_date.is_some_and(|end| date > end) {
        return false;
    }
    if rule.interval <= 0 {
        return false;
    }
    let interval = i64::from(rule.interval);
    let anchor = rule.start_date.unwrap_or_default();

    match &rule.frequency {
        Frequency::None | Frequency::Unknown(_) => false,
        Frequency::Daily => (date - anchor).num_days().rem_euclid(interval) == 0,
        Frequency::Weekly => {
            let on_listed_day = rule
                .days_of_week
                .as_ref()
                .is_some_and(|days| days.contains(&weekday_index(date.weekday())));
            let weeks = (date - anchor).num_days().div_euclid(7);
            on_listed_day && weeks.rem_euclid(interval) == 0
        }
        Frequency::Monthly => {
            rule.day_of_month
                .is_some_and(|day| day_of_month_matches(day, date))
                && months_between(anchor, date).rem_euclid(interval) == 0
        }
        Frequency::Yearly => {
            rule.month == Some(date.month())
                && rule
                    .day_of_month
                    .is_some_and(|day| day_of_month_matches(day, date))
                && i64::from(date.year() - anchor.year()).rem_euclid(interval) == 0
        }
        Frequency::Custom => match &rule.custom_pattern {
            Some(CustomPattern::Weekdays) => !is_weekend(date.weekday()),
            Some(CustomPattern::Weekends) => is_weekend(date.weekday()),
            Some(CustomPattern::NthWeekday { n, weekday }) => {
                weekday_index(date.weekday()) == *weekday && nth_weekday_matches(*n, date)
            }
            None => false,
        },
    }
}

pub fn validate_rule(rule: &RecurrenceRule) -> RuleValidation {
    let mut errors = Vec::new();

    if let Frequency::Unknown(tag) = &rule.frequency {
        errors.push(format!("Unknown frequency: {tag}"));
    }

    if rule.interval <= 0 {
        errors.push(format!(
            "Interval must be a positive integer, got {}",
            rule.interval
        ));
    }

    match &rule.frequency {
        Frequency::Weekly => match &rule.days_of_week {
            Some(days) if !days.is_empty() => {
                for day in days.iter().filter(|day| **day > 6) {
                    errors.push(format!("Day of week {day} is outside 0-6"));
                }
            }
            _ => errors.push("Weekly rules need at least one day of week".to_string()),
        },
        Frequency::Monthly => match rule.day_of_month {
            Some(day) => check_day_of_month(day, &mut errors),
            None => errors.push("Monthly rules need a day of month".to_string()),
        },
        Frequency::Yearly => {
            match rule.month {
                Some(month) if (1..=12).contains(&month) => {}
                Some(month) => errors.push(format!("Month {month} is outside 1-12")),
                None => errors.push("Yearly rules need a month".to_string()),
            }
            match rule.day_of_month {
                Some(day) => {
                    check_day_of_month(day, &mut errors);
                    // 2000 is a leap year, so February 29 stays valid
                    if let (Some(month), true) = (rule.month, day > 0) {
                        if let Some(longest) = last_day_of_month(2000, month) {
                            if day as u32 > longest {
                                errors.push(format!("Day {day} never occurs in month {month}"));
                            }
                        }
                    }
                }
                None => errors.push("Yearly rules need a day of month".to_string()),
            }
        }
        Frequency::Custom => match &rule.custom_pattern {
            Some(CustomPattern::NthWeekday { n, weekday }) => {
                if !((1..=5).contains(n) || *n == -1) {
                    errors.push(format!("Occurrence {n} must be 1-5 or -1 for the last"));
                }
                if *weekday > 6 {
                    errors.push(format!("Day of week {weekday} is outside 0-6"));
                }
            }
            Some(CustomPattern::Weekdays | CustomPattern::Weekends) => {}
            None => errors.push("Custom rules need a pattern".to_string()),
        },
        Frequency::None | Frequency::Daily | Frequency::Unknown(_) => {}
    }

    if let (Some(start), Some(end)) = (rule.start_date, rule.end_date) {
        if end <= start {
            errors.push(format!("End date {end} must be after start date {start}"));
        }
    }

    RuleValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn check_day_of_month(day: i32, errors: &mut Vec<String>) {
    if day == 0 || !(-31..=31).contains(&day) {
        errors.push(format!(
            "Day of month {day} must be 1-31, or negative to count back from the month end"
        ));
    }
}

fn weekday_index(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday()
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

fn day_of_month_matches(day: i32, date: NaiveDate) -> bool {
    let Some(last_day) = last_day_of_month(date.year(), date.month()) else {
        return false;
    };
    let target = if day > 0 {
        day
    } else {
        last_day as i32 + day + 1
    };
    target >= 1 && target as u32 == date.day()
}

fn nth_weekday_matches(n: i32, date: NaiveDate) -> bool {
    if n > 0 {
        (date.day() as i32 - 1) / 7 + 1 == n
    } else if n < 0 {
        last_day_of_month(date.year(), date.month())
            .is_some_and(|last| (last as i32 - date.day() as i32) / 7 + 1 == -n)
    } else {
        false
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}

pub(crate) fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|date| date.day())
}
