use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::task::TaskDefinition;
use crate::services::schedule_utils;

/// Waking horizon for one date: tasks may occupy `[wake_time, sleep_time)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSchedule {
    wake_time: String,
    sleep_time: String,
    duration_hours: f64,
    #[serde(skip)]
    wake_minutes: u32,
    #[serde(skip)]
    sleep_minutes: u32,
}

impl SleepSchedule {
    pub fn new(wake_time: &str, sleep_time: &str, duration_hours: f64) -> AppResult<Self> {
        let wake_minutes = schedule_utils::time_string_to_minutes(wake_time)?;
        let sleep_minutes = schedule_utils::time_string_to_minutes(sleep_time)?;
        if wake_minutes >= sleep_minutes {
            return Err(AppError::validation(format!(
                "wake time {wake_time} must be earlier than sleep time {sleep_time}"
            )));
        }
        Ok(Self {
            wake_time: wake_time.to_string(),
            sleep_time: sleep_time.to_string(),
            duration_hours,
            wake_minutes,
            sleep_minutes,
        })
    }

    pub fn wake_time(&self) -> &str {
        &self.wake_time
    }

    pub fn sleep_time(&self) -> &str {
        &self.sleep_time
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_hours
    }

    pub fn wake_minutes(&self) -> u32 {
        self.wake_minutes
    }

    pub fn sleep_minutes(&self) -> u32 {
        self.sleep_minutes
    }

    pub fn horizon_minutes(&self) -> u32 {
        self.sleep_minutes - self.wake_minutes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    TimeOverlap,
    DependencyViolation,
    MissingDependency,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

impl ConflictSeverity {
    /// Under 30 minutes is low, 30 to 60 medium, anything longer high.
    pub fn for_overlap(overlap_minutes: u32) -> Self {
        if overlap_minutes < 30 {
            ConflictSeverity::Low
        } else if overlap_minutes <= 60 {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::High
        }
    }
}

/// One detected problem between a task and another task id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub conflict_type: ConflictType,
    pub related_task_id: String,
    /// Overlap or violation length; zero for missing dependencies
    pub minutes: u32,
    pub severity: ConflictSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    #[serde(flatten)]
    pub task: TaskDefinition,
    pub instance_id: String,
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub is_anchor: bool,
    #[serde(default)]
    pub is_flexible: bool,
    #[serde(default)]
    pub has_conflicts: bool,
    #[serde(default)]
    pub conflict_type: Option<ConflictType>,
    #[serde(default)]
    pub conflict_severity: Option<ConflictSeverity>,
    #[serde(default)]
    pub conflicts: Vec<ConflictRecord>,
}

impl ScheduledTask {
    /// Unplaced occurrence of `task` with a fresh instance id.
    pub fn from_definition(task: TaskDefinition) -> Self {
        Self {
            task,
            instance_id: Uuid::new_v4().to_string(),
            scheduled_time: None,
            is_anchor: false,
            is_flexible: false,
            has_conflicts: false,
            conflict_type: None,
            conflict_severity: None,
            conflicts: Vec::new(),
        }
    }

    pub fn scheduled_at(task: TaskDefinition, time: impl Into<String>) -> Self {
        let mut scheduled = Self::from_definition(task);
        scheduled.scheduled_time = Some(time.into());
        scheduled
    }

    pub fn id(&self) -> &str {
        &self.task.id
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_time.is_some()
    }

    /// Occupied interval in minutes from midnight, if the start time parses
    /// and the end fits in `u32`.
    pub fn interval(&self) -> Option<(u32, u32)> {
        let start = self.start_minutes()?;
        let end = start.checked_add(self.task.duration_minutes)?;
        Some((start, end))
    }

    pub fn start_minutes(&self) -> Option<u32> {
        self.scheduled_time
            .as_deref()
            .and_then(|raw| schedule_utils::time_string_to_minutes(raw).ok())
    }

    pub fn end_minutes(&self) -> Option<u32> {
        self.interval().map(|(_, end)| end)
    }

    pub fn clear_conflicts(&mut self) {
        self.has_conflicts = false;
        self.conflict_type = None;
        self.conflict_severity = None;
        self.conflicts.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityReport {
    pub possible: bool,
    pub required_minutes: u32,
    pub available_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleErrorKind {
    ImpossibleSchedule,
    SchedulingError,
}

impl std::fmt::Display for ScheduleErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleErrorKind::ImpossibleSchedule => write!(f, "impossible_schedule"),
            ScheduleErrorKind::SchedulingError => write!(f, "scheduling_error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSuccess {
    pub success: bool,
    pub date: NaiveDate,
    pub schedule: Vec<ScheduledTask>,
    pub total_tasks: usize,
    pub scheduled_tasks: usize,
    pub conflict_count: usize,
    pub sleep_schedule: SleepSchedule,
}

impl ScheduleSuccess {
    pub fn new(
        date: NaiveDate,
        schedule: Vec<ScheduledTask>,
        sleep_schedule: SleepSchedule,
    ) -> Self {
        let scheduled_tasks = schedule.iter().filter(|task| task.is_scheduled()).count();
        let conflict_count = schedule.iter().filter(|task| task.has_conflicts).count();
        Self {
            success: true,
            date,
            total_tasks: schedule.len(),
            scheduled_tasks,
            conflict_count,
            schedule,
            sleep_schedule,
        }
    }

    pub fn unscheduled(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.schedule.iter().filter(|task| !task.is_scheduled())
    }

    pub fn task(&self, task_id: &str) -> Option<&ScheduledTask> {
        self.schedule.iter().find(|task| task.id() == task_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFailure {
    pub success: bool,
    pub error: ScheduleErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl ScheduleFailure {
    pub fn impossible(message: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self {
            success: false,
            error: ScheduleErrorKind::ImpossibleSchedule,
            message: message.into(),
            suggestions: Some(suggestions),
        }
    }

    pub fn from_error(error: &AppError) -> Self {
        Self {
            success: false,
            error: ScheduleErrorKind::SchedulingError,
            message: error.to_string(),
            suggestions: None,
        }
    }
}

/// Result of generating one date's schedule. Serializes to the flat
/// `{success: ...}` shape the embedding UI consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScheduleOutcome {
    Success(ScheduleSuccess),
    Failure(ScheduleFailure),
}

impl ScheduleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScheduleOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&ScheduleSuccess> {
        match self {
            ScheduleOutcome::Success(success) => Some(success),
            ScheduleOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ScheduleFailure> {
        match self {
            ScheduleOutcome::Success(_) => None,
            ScheduleOutcome::Failure(failure) => Some(failure),
        }
    }
}
