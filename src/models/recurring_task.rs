use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Recurrence frequency tag. Unrecognised tags are kept verbatim so that
/// validation can report them instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Frequency {
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
    Unknown(String),
}

impl From<String> for Frequency {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "none" => Frequency::None,
            "daily" => Frequency::Daily,
            "weekly" => Frequency::Weekly,
            "monthly" => Frequency::Monthly,
            "yearly" => Frequency::Yearly,
            "custom" => Frequency::Custom,
            _ => Frequency::Unknown(value),
        }
    }
}

impl From<Frequency> for String {
    fn from(value: Frequency) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::None => write!(f, "none"),
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
            Frequency::Custom => write!(f, "custom"),
            Frequency::Unknown(raw) => write!(f, "{raw}"),
        }
    }
}

/// Sub-patterns for `custom` frequency rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomPattern {
    /// Monday through Friday
    Weekdays,
    /// Saturday and Sunday
    Weekends,
    /// The `n`th `weekday` of the month (0 = Sunday). `n = -1` is the last one.
    NthWeekday { n: i32, weekday: u32 },
}

/// Structured recurrence rule attached to a task template.
///
/// Weekday indices run from 0 (Sunday) to 6 (Saturday). A `day_of_month` of
/// `-1` means the last day of the month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: i32,
    #[serde(default)]
    pub days_of_week: Option<Vec<u32>>,
    #[serde(default)]
    pub day_of_month: Option<i32>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub custom_pattern: Option<CustomPattern>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn default_interval() -> i32 {
    1
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::new(Frequency::Daily)
    }
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            days_of_week: None,
            day_of_month: None,
            month: None,
            custom_pattern: None,
            start_date: None,
            end_date: None,
        }
    }

    pub fn none() -> Self {
        Self::new(Frequency::None)
    }

    pub fn daily() -> Self {
        Self::new(Frequency::Daily)
    }

    pub fn weekly(days_of_week: Vec<u32>) -> Self {
        Self {
            days_of_week: Some(days_of_week),
            ..Self::new(Frequency::Weekly)
        }
    }

    pub fn monthly(day_of_month: i32) -> Self {
        Self {
            day_of_month: Some(day_of_month),
            ..Self::new(Frequency::Monthly)
        }
    }

    pub fn yearly(month: u32, day_of_month: i32) -> Self {
        Self {
            month: Some(month),
            day_of_month: Some(day_of_month),
            ..Self::new(Frequency::Yearly)
        }
    }

    pub fn custom(pattern: CustomPattern) -> Self {
        Self {
            custom_pattern: Some(pattern),
            ..Self::new(Frequency::Custom)
        }
    }

    pub fn with_interval(mut self, interval: i32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }
}

/// Outcome of validating a recurrence rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl InstanceStatus {
    /// Completed and skipped occurrences are not regenerated for their date.
    pub fn blocks_regeneration(self) -> bool {
        matches!(self, InstanceStatus::Completed | InstanceStatus::Skipped)
    }
}

/// Status of a template's occurrence on a given date, as tracked by the
/// embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRecord {
    pub template_id: String,
    pub date: NaiveDate,
    pub status: InstanceStatus,
}
