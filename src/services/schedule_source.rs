use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::recurring_task::InstanceRecord;
use crate::models::settings::{DailyScheduleOverride, SchedulerSettings};
use crate::models::task::TaskDefinition;

/// Read-only access to everything a single schedule run needs. Implemented by
/// the embedding application over whatever storage it uses.
pub trait ScheduleSource {
    fn settings(&self) -> AppResult<SchedulerSettings>;

    fn task_templates(&self) -> AppResult<Vec<TaskDefinition>>;

    /// Instances already materialized for `date`, with their status.
    fn instances_for_date(&self, date: NaiveDate) -> AppResult<Vec<InstanceRecord>>;

    fn daily_override(&self, date: NaiveDate) -> AppResult<Option<DailyScheduleOverride>>;
}

impl<T: ScheduleSource + ?Sized> ScheduleSource for &T {
    fn settings(&self) -> AppResult<SchedulerSettings> {
        (**self).settings()
    }

    fn task_templates(&self) -> AppResult<Vec<TaskDefinition>> {
        (**self).task_templates()
    }

    fn instances_for_date(&self, date: NaiveDate) -> AppResult<Vec<InstanceRecord>> {
        (**self).instances_for_date(date)
    }

    fn daily_override(&self, date: NaiveDate) -> AppResult<Option<DailyScheduleOverride>> {
        (**self).daily_override(date)
    }
}

/// In-memory source, also the on-disk shape loaded by
/// [`crate::services::settings_service::load_schedule_input`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInput {
    #[serde(default)]
    pub settings: SchedulerSettings,
    #[serde(default)]
    pub templates: Vec<TaskDefinition>,
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    #[serde(default)]
    pub overrides: Vec<DailyScheduleOverride>,
}

impl ScheduleInput {
    pub fn new(settings: SchedulerSettings, templates: Vec<TaskDefinition>) -> Self {
        Self {
            settings,
            templates,
            instances: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn with_instance(mut self, instance: InstanceRecord) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_override(mut self, day_override: DailyScheduleOverride) -> Self {
        self.overrides.push(day_override);
        self
    }
}

impl ScheduleSource for ScheduleInput {
    fn settings(&self) -> AppResult<SchedulerSettings> {
        Ok(self.settings.clone())
    }

    fn task_templates(&self) -> AppResult<Vec<TaskDefinition>> {
        Ok(self.templates.clone())
    }

    fn instances_for_date(&self, date: NaiveDate) -> AppResult<Vec<InstanceRecord>> {
        Ok(self
            .instances
            .iter()
            .filter(|instance| instance.date == date)
            .cloned()
            .collect())
    }

    fn daily_override(&self, date: NaiveDate) -> AppResult<Option<DailyScheduleOverride>> {
        Ok(self
            .overrides
            .iter()
            .find(|day_override| day_override.date == date)
            .cloned())
    }
}
