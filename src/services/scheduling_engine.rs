use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::error::AppResult;
use crate::models::recurring_task::InstanceRecord;
use crate::models::schedule::{
    FeasibilityReport, ScheduleFailure, ScheduleOutcome, ScheduleSuccess, ScheduledTask,
    SleepSchedule,
};
use crate::models::task::TaskDefinition;
use crate::services::conflict_detector;
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::recurrence_engine::RecurrenceEngine;
use crate::services::schedule_source::ScheduleSource;
use crate::services::schedule_utils;
use crate::services::settings_service;

pub const DEFAULT_SLOT_GRANULARITY_MINUTES: u32 = 15;
pub const DEFAULT_DEPENDENCY_BUFFER_MINUTES: u32 = 5;

/// Decides whether a task template yields an occurrence on a date.
pub trait OccurrencePolicy {
    fn should_generate_for_date(&self, task: &TaskDefinition, date: NaiveDate) -> bool;
}

/// Orders a day's tasks so that predecessors come before their dependents.
pub trait TaskOrdering {
    fn order_tasks(&self, tasks: &[TaskDefinition]) -> Vec<TaskDefinition>;
}

impl OccurrencePolicy for RecurrenceEngine {
    fn should_generate_for_date(&self, task: &TaskDefinition, date: NaiveDate) -> bool {
        RecurrenceEngine::should_generate_for_date(self, task, date)
    }
}

impl TaskOrdering for DependencyResolver {
    fn order_tasks(&self, tasks: &[TaskDefinition]) -> Vec<TaskDefinition> {
        self.topological_sort(tasks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementConfig {
    pub slot_granularity_minutes: u32,
    /// Gap between a predecessor's end and its dependent's earliest start
    pub dependency_buffer_minutes: u32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: DEFAULT_SLOT_GRANULARITY_MINUTES,
            dependency_buffer_minutes: DEFAULT_DEPENDENCY_BUFFER_MINUTES,
        }
    }
}

/// Builds one day's schedule: fixed tasks become anchors, flexible tasks are
/// slotted around them in dependency order, and the result is annotated with
/// any remaining conflicts.
#[derive(Debug, Clone)]
pub struct SchedulingEngine<R = RecurrenceEngine, D = DependencyResolver> {
    recurrence: R,
    resolver: D,
    config: PlacementConfig,
}

impl Default for SchedulingEngine {
    fn default() -> Self {
        Self::new(RecurrenceEngine::new(), DependencyResolver::new())
    }
}

impl<R, D> SchedulingEngine<R, D>
where
    R: OccurrencePolicy,
    D: TaskOrdering,
{
    pub fn new(recurrence: R, resolver: D) -> Self {
        Self {
            recurrence,
            resolver,
            config: PlacementConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlacementConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> PlacementConfig {
        self.config
    }

    /// Templates that produce an occurrence on `date`: active, not already
    /// completed or skipped for the date, and matched by their rule.
    pub fn applicable_tasks(
        &self,
        date: NaiveDate,
        templates: &[TaskDefinition],
        instances: &[InstanceRecord],
    ) -> Vec<TaskDefinition> {
        let settled: HashSet<&str> = instances
            .iter()
            .filter(|instance| instance.date == date && instance.status.blocks_regeneration())
            .map(|instance| instance.template_id.as_str())
            .collect();

        templates
            .iter()
            .filter(|task| task.is_active)
            .filter(|task| !settled.contains(task.id.as_str()))
            .filter(|task| self.recurrence.should_generate_for_date(task, date))
            .cloned()
            .collect()
    }

    pub fn check_schedule_impossibility(
        &self,
        tasks: &[TaskDefinition],
        sleep: &SleepSchedule,
    ) -> FeasibilityReport {
        let required_minutes = tasks
            .iter()
            .filter(|task| task.is_mandatory)
            .fold(0u32, |acc, task| acc.saturating_add(task.duration_minutes));
        let available_minutes = sleep.horizon_minutes();

        if required_minutes <= available_minutes {
            return FeasibilityReport {
                possible: true,
                required_minutes,
                available_minutes,
                message: None,
                suggestions: None,
            };
        }

        let shortfall = required_minutes - available_minutes;
        let message = format!(
            "Mandatory tasks need {required_minutes} minutes but only {available_minutes} \
             minutes are available between {} and {} ({shortfall} minutes short)",
            sleep.wake_time(),
            sleep.sleep_time(),
        );
        let suggestions = vec![
            "Reduce the number of mandatory tasks on this day".to_string(),
            format!(
                "Shorten mandatory tasks by at least {shortfall} minutes in total \
                 (currently {required_minutes} minutes)"
            ),
            "Mark some tasks as optional so they can be left out of a full day".to_string(),
            "Wake up earlier or go to sleep later to extend the available time".to_string(),
        ];

        FeasibilityReport {
            possible: false,
            required_minutes,
            available_minutes,
            message: Some(message),
            suggestions: Some(suggestions),
        }
    }

    /// Pin every fixed task at its default time, ordered by start.
    pub fn place_anchors(&self, tasks: &[TaskDefinition]) -> Vec<ScheduledTask> {
        let mut anchors: Vec<ScheduledTask> = tasks
            .iter()
            .filter(|task| task.is_fixed())
            .map(|task| {
                let mut anchor = ScheduledTask::from_definition(task.clone());
                anchor.scheduled_time = task.default_time.clone();
                anchor.is_anchor = true;
                anchor
            })
            .collect();

        for anchor in &anchors {
            if anchor.interval().is_none() {
                warn!(
                    target: "app::scheduler",
                    task_id = %anchor.id(),
                    default_time = ?anchor.scheduled_time,
                    "fixed task has no usable interval"
                );
            }
        }

        anchors.sort_by_key(|anchor| anchor.start_minutes().unwrap_or(u32::MAX));
        anchors
    }

    /// Slot the flexible tasks of `ordered` around the already `placed`
    /// tasks. Tasks that fit nowhere are appended with no scheduled time.
    pub fn place_flexible_tasks(
        &self,
        ordered: &[TaskDefinition],
        placed: Vec<ScheduledTask>,
        sleep: &SleepSchedule,
    ) -> Vec<ScheduledTask> {
        self.place_flexible_with(self.config, ordered, placed, sleep)
    }

    pub fn detect_and_mark_conflicts(&self, schedule: Vec<ScheduledTask>) -> Vec<ScheduledTask> {
        conflict_detector::detect_and_mark_conflicts(schedule)
    }

    /// Anchors, ordering, flexible placement and conflict marking for an
    /// already filtered task list. Scheduled tasks come first by start time.
    pub fn build_schedule(
        &self,
        tasks: &[TaskDefinition],
        sleep: &SleepSchedule,
    ) -> Vec<ScheduledTask> {
        self.build_schedule_with(self.config, tasks, sleep)
    }

    /// Generate the schedule for one date. Failures are reported in the
    /// returned outcome, never as an `Err`.
    pub fn generate_schedule_for_date<S>(&self, date: NaiveDate, source: &S) -> ScheduleOutcome
    where
        S: ScheduleSource + ?Sized,
    {
        match self.try_generate(date, source) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    target: "app::scheduler",
                    %date,
                    error = %err,
                    "schedule generation failed"
                );
                ScheduleOutcome::Failure(ScheduleFailure::from_error(&err))
            }
        }
    }

    pub fn generate_schedule_for_dates<S>(
        &self,
        dates: &[NaiveDate],
        source: &S,
    ) -> BTreeMap<NaiveDate, ScheduleOutcome>
    where
        S: ScheduleSource + ?Sized,
    {
        dates
            .iter()
            .map(|&date| (date, self.generate_schedule_for_date(date, source)))
            .collect()
    }

    fn try_generate<S>(&self, date: NaiveDate, source: &S) -> AppResult<ScheduleOutcome>
    where
        S: ScheduleSource + ?Sized,
    {
        let settings = source.settings()?;
        settings_service::validate_settings(&settings)?;

        let templates = source.task_templates()?;
        let instances = source.instances_for_date(date)?;
        let day_override = source.daily_override(date)?;
        let sleep = settings_service::resolve_sleep_schedule(&settings, day_override.as_ref())?;

        let tasks = self.applicable_tasks(date, &templates, &instances);
        info!(
            target: "app::scheduler",
            %date,
            templates = templates.len(),
            applicable = tasks.len(),
            wake = %sleep.wake_time(),
            sleep = %sleep.sleep_time(),
            "generating schedule"
        );

        let feasibility = self.check_schedule_impossibility(&tasks, &sleep);
        if !feasibility.possible {
            warn!(
                target: "app::scheduler",
                %date,
                required = feasibility.required_minutes,
                available = feasibility.available_minutes,
                "mandatory load exceeds the waking day"
            );
            return Ok(ScheduleOutcome::Failure(ScheduleFailure::impossible(
                feasibility.message.unwrap_or_default(),
                feasibility.suggestions.unwrap_or_default(),
            )));
        }

        let config = PlacementConfig {
            dependency_buffer_minutes: settings.buffer_minutes,
            ..self.config
        };
        let schedule = self.build_schedule_with(config, &tasks, &sleep);
        let success = ScheduleSuccess::new(date, schedule, sleep);

        info!(
            target: "app::scheduler",
            %date,
            total = success.total_tasks,
            scheduled = success.scheduled_tasks,
            conflicts = success.conflict_count,
            "schedule generated"
        );

        Ok(ScheduleOutcome::Success(success))
    }

    fn build_schedule_with(
        &self,
        config: PlacementConfig,
        tasks: &[TaskDefinition],
        sleep: &SleepSchedule,
    ) -> Vec<ScheduledTask> {
        let anchors = self.place_anchors(tasks);
        let ordered = self.resolver.order_tasks(tasks);
        let placed = self.place_flexible_with(config, &ordered, anchors, sleep);

        let mut schedule = self.detect_and_mark_conflicts(placed);
        schedule.sort_by_key(|task| task.start_minutes().unwrap_or(u32::MAX));
        schedule
    }

    fn place_flexible_with(
        &self,
        config: PlacementConfig,
        ordered: &[TaskDefinition],
        placed: Vec<ScheduledTask>,
        sleep: &SleepSchedule,
    ) -> Vec<ScheduledTask> {
        let run_ids: HashSet<String> = placed
            .iter()
            .map(|task| task.id().to_string())
            .chain(ordered.iter().map(|task| task.id.clone()))
            .collect();

        let mut working = placed;
        let mut unplaced = Vec::new();

        for task in ordered.iter().filter(|task| task.is_flexible()) {
            let mut earliest = sleep.wake_minutes();
            let mut waiting_on = None;

            for predecessor in task.predecessors() {
                if !run_ids.contains(predecessor) {
                    continue;
                }
                let predecessor_end = working
                    .iter()
                    .find(|placed| placed.id() == predecessor)
                    .and_then(ScheduledTask::end_minutes);
                match predecessor_end {
                    Some(end) => {
                        earliest = earliest
                            .max(end.saturating_add(config.dependency_buffer_minutes));
                    }
                    None => {
                        waiting_on = Some(predecessor);
                        break;
                    }
                }
            }

            if let Some(predecessor) = waiting_on {
                debug!(
                    target: "app::scheduler",
                    task_id = %task.id,
                    predecessor = %predecessor,
                    "predecessor not placed, leaving task unscheduled"
                );
                unplaced.push(ScheduledTask::from_definition(task.clone()));
                continue;
            }

            match find_slot(config, task, earliest, &working, sleep) {
                Some(start) => {
                    let mut scheduled = ScheduledTask::scheduled_at(
                        task.clone(),
                        schedule_utils::minutes_to_time_string(start),
                    );
                    scheduled.is_flexible = true;
                    working.push(scheduled);
                }
                None => {
                    debug!(
                        target: "app::scheduler",
                        task_id = %task.id,
                        window = %task.window(),
                        earliest = %schedule_utils::minutes_to_time_string(earliest),
                        "no free slot for flexible task"
                    );
                    unplaced.push(ScheduledTask::from_definition(task.clone()));
                }
            }
        }

        working.extend(unplaced);
        working
    }
}

/// First start on the slot grid, at or after `earliest`, whose interval
/// stays clear of every placed task and ends by sleep time.
fn find_slot(
    config: PlacementConfig,
    task: &TaskDefinition,
    earliest: u32,
    placed: &[ScheduledTask],
    sleep: &SleepSchedule,
) -> Option<u32> {
    let (window_start, window_end) = task.window().bounds();
    let range_start = window_start.max(sleep.wake_minutes()).max(earliest);
    let range_end = window_end.min(sleep.sleep_minutes());
    let step = config.slot_granularity_minutes.max(1);

    let obstacles: Vec<(u32, u32)> = placed.iter().filter_map(ScheduledTask::interval).collect();

    let mut candidate = range_start;
    while candidate < range_end {
        let end = candidate.checked_add(task.duration_minutes)?;
        if end > sleep.sleep_minutes() {
            return None;
        }
        let blocked = obstacles
            .iter()
            .any(|&(start, stop)| schedule_utils::has_time_overlap(candidate, end, start, stop));
        if !blocked {
            return Some(candidate);
        }
        candidate += step;
    }

    None
}
