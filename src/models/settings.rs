use serde::{Deserialize, Serialize};

/// User-level scheduling preferences supplied by the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSettings {
    #[serde(default = "default_wake_time")]
    pub default_wake_time: String,
    #[serde(default = "default_sleep_time")]
    pub default_sleep_time: String,
    /// Hours of sleep the user aims for
    #[serde(default = "default_sleep_duration")]
    pub desired_sleep_duration: f64,
    /// Gap enforced between a task and the end of its predecessor
    #[serde(default = "default_buffer_minutes")]
    pub buffer_minutes: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            default_wake_time: default_wake_time(),
            default_sleep_time: default_sleep_time(),
            desired_sleep_duration: default_sleep_duration(),
            buffer_minutes: default_buffer_minutes(),
        }
    }
}

fn default_wake_time() -> String {
    crate::services::settings_service::DEFAULT_WAKE_TIME.to_string()
}

fn default_sleep_time() -> String {
    crate::services::settings_service::DEFAULT_SLEEP_TIME.to_string()
}

fn default_sleep_duration() -> f64 {
    crate::services::settings_service::DEFAULT_SLEEP_DURATION_HOURS
}

fn default_buffer_minutes() -> u32 {
    crate::services::settings_service::DEFAULT_BUFFER_MINUTES
}

/// Per-date wake/sleep times that supersede the settings defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyScheduleOverride {
    pub date: chrono::NaiveDate,
    pub wake_time: String,
    pub sleep_time: String,
}
