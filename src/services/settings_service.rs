use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::schedule::SleepSchedule;
use crate::models::settings::{DailyScheduleOverride, SchedulerSettings};
use crate::services::schedule_source::ScheduleInput;
use crate::services::schedule_utils;

pub const DEFAULT_WAKE_TIME: &str = "07:00";
pub const DEFAULT_SLEEP_TIME: &str = "23:00";
pub const DEFAULT_SLEEP_DURATION_HOURS: f64 = 8.0;
pub const DEFAULT_BUFFER_MINUTES: u32 = 5;

const MAX_BUFFER_MINUTES: u32 = 240;

pub fn validate_settings(settings: &SchedulerSettings) -> AppResult<()> {
    let wake = schedule_utils::time_string_to_minutes(&settings.default_wake_time)?;
    let sleep = schedule_utils::time_string_to_minutes(&settings.default_sleep_time)?;
    schedule_utils::ensure_window(wake, sleep)?;

    if !settings.desired_sleep_duration.is_finite()
        || !(0.0..=24.0).contains(&settings.desired_sleep_duration)
    {
        return Err(AppError::validation_with_details(
            "desired sleep duration must be between 0 and 24 hours",
            json!({"desiredSleepDuration": settings.desired_sleep_duration}),
        ));
    }

    if settings.buffer_minutes > MAX_BUFFER_MINUTES {
        return Err(AppError::validation_with_details(
            format!("buffer minutes may not exceed {MAX_BUFFER_MINUTES}"),
            json!({"bufferMinutes": settings.buffer_minutes}),
        ));
    }

    Ok(())
}

/// Waking horizon for a date: the override's times when one exists,
/// otherwise the settings defaults.
pub fn resolve_sleep_schedule(
    settings: &SchedulerSettings,
    day_override: Option<&DailyScheduleOverride>,
) -> AppResult<SleepSchedule> {
    match day_override {
        Some(day_override) => {
            debug!(
                target: "app::config",
                date = %day_override.date,
                wake = %day_override.wake_time,
                sleep = %day_override.sleep_time,
                "using daily schedule override"
            );
            SleepSchedule::new(
                &day_override.wake_time,
                &day_override.sleep_time,
                settings.desired_sleep_duration,
            )
        }
        None => SleepSchedule::new(
            &settings.default_wake_time,
            &settings.default_sleep_time,
            settings.desired_sleep_duration,
        ),
    }
}

/// Load and validate scheduler settings from a YAML or JSON file.
pub fn load_settings(path: impl AsRef<Path>) -> AppResult<SchedulerSettings> {
    let settings: SchedulerSettings = read_config_file(path.as_ref())?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Load a complete in-memory schedule source from a YAML or JSON file.
pub fn load_schedule_input(path: impl AsRef<Path>) -> AppResult<ScheduleInput> {
    let input: ScheduleInput = read_config_file(path.as_ref())?;
    validate_settings(&input.settings)?;
    info!(
        target: "app::config",
        templates = input.templates.len(),
        instances = input.instances.len(),
        overrides = input.overrides.len(),
        "loaded schedule input"
    );
    Ok(input)
}

fn read_config_file<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let raw = std::fs::read_to_string(path)?;
    debug!(target: "app::config", path = %path.display(), "reading config file");

    match extension.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&raw)?),
        Some("json") => Ok(serde_json::from_str(&raw)?),
        _ => Err(AppError::validation_with_details(
            "config file must have a .yaml, .yml or .json extension",
            json!({"path": path.display().to_string()}),
        )),
    }
}
