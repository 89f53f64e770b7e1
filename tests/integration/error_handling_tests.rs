// Error handling and edge case tests

use chrono::NaiveDate;
use dayplan_engine::error::{AppError, AppResult};
use dayplan_engine::models::recurring_task::InstanceRecord;
use dayplan_engine::models::schedule::{ScheduleErrorKind, ScheduleOutcome};
use dayplan_engine::models::settings::{DailyScheduleOverride, SchedulerSettings};
use dayplan_engine::models::task::TaskDefinition;
use dayplan_engine::services::rrule_parser::RRuleParser;
use dayplan_engine::services::schedule_source::{ScheduleInput, ScheduleSource};
use dayplan_engine::services::scheduling_engine::SchedulingEngine;
use dayplan_engine::services::settings_service;

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).expect("valid date")
}

fn setup_engine() -> SchedulingEngine {
    SchedulingEngine::default()
}

/// Source whose template store is unreachable.
struct UnreachableTemplates;

impl ScheduleSource for UnreachableTemplates {
    fn settings(&self) -> AppResult<SchedulerSettings> {
        Ok(SchedulerSettings::default())
    }

    fn task_templates(&self) -> AppResult<Vec<TaskDefinition>> {
        Err(AppError::data_source("template store offline"))
    }

    fn instances_for_date(&self, _date: NaiveDate) -> AppResult<Vec<InstanceRecord>> {
        Ok(Vec::new())
    }

    fn daily_override(&self, _date: NaiveDate) -> AppResult<Option<DailyScheduleOverride>> {
        Ok(None)
    }
}

fn failure_kind(outcome: &ScheduleOutcome) -> Option<ScheduleErrorKind> {
    outcome.failure().map(|failure| failure.error)
}

#[test]
fn test_source_error_becomes_scheduling_error() {
    let engine = setup_engine();

    let outcome = engine.generate_schedule_for_date(test_date(), &UnreachableTemplates);

    assert_eq!(failure_kind(&outcome), Some(ScheduleErrorKind::SchedulingError));
    let failure = outcome.failure().expect("failure");
    assert!(failure.message.contains("template store offline"));
    assert!(failure.suggestions.is_none());
}

#[test]
fn test_trait_object_source_is_accepted() {
    let engine = setup_engine();
    let source: Box<dyn ScheduleSource> = Box::new(UnreachableTemplates);

    let outcomes = engine.generate_schedule_for_dates(&[test_date()], &*source);

    assert_eq!(outcomes.len(), 1);
    assert!(outcomes.values().all(|outcome| !outcome.is_success()));
}

#[test]
fn test_malformed_settings_become_scheduling_error() {
    let engine = setup_engine();

    for (wake, sleep) in [("25:99", "23:00"), ("23:00", "07:00"), ("", "22:00")] {
        let input = ScheduleInput::new(
            SchedulerSettings {
                default_wake_time: wake.to_string(),
                default_sleep_time: sleep.to_string(),
                ..SchedulerSettings::default()
            },
            vec![TaskDefinition::flexible("a", 30)],
        );

        let outcome = engine.generate_schedule_for_date(test_date(), &input);
        assert_eq!(
            failure_kind(&outcome),
            Some(ScheduleErrorKind::SchedulingError),
            "wake {wake:?} sleep {sleep:?}"
        );
    }
}

#[test]
fn test_inverted_override_becomes_scheduling_error() {
    let engine = setup_engine();
    let input = ScheduleInput::new(
        SchedulerSettings::default(),
        vec![TaskDefinition::flexible("a", 30)],
    )
    .with_override(DailyScheduleOverride {
        date: test_date(),
        wake_time: "20:00".to_string(),
        sleep_time: "08:00".to_string(),
    });

    let outcome = engine.generate_schedule_for_date(test_date(), &input);

    assert_eq!(failure_kind(&outcome), Some(ScheduleErrorKind::SchedulingError));
}

#[test]
fn test_mandatory_overload_is_impossible() {
    let engine = setup_engine();
    let input = ScheduleInput::new(
        SchedulerSettings::default(),
        vec![
            TaskDefinition::flexible("deep-work", 600).mandatory(),
            TaskDefinition::flexible("errands", 400).mandatory(),
        ],
    );

    let outcome = engine.generate_schedule_for_date(test_date(), &input);

    assert_eq!(failure_kind(&outcome), Some(ScheduleErrorKind::ImpossibleSchedule));
    let failure = outcome.failure().expect("failure");
    assert!(failure.message.contains("1000"));
    assert!(failure.message.contains("960"));
    assert!(failure
        .suggestions
        .as_ref()
        .is_some_and(|suggestions| !suggestions.is_empty()));

    let value = serde_json::to_value(&outcome).expect("serialize");
    assert_eq!(value["success"], false);
    assert_eq!(value["error"], "impossible_schedule");
}

#[test]
fn test_dependency_cycle_is_not_a_failure() {
    let engine = setup_engine();
    let input = ScheduleInput::new(
        SchedulerSettings::default(),
        vec![
            TaskDefinition::flexible("a", 30).with_dependency("b"),
            TaskDefinition::flexible("b", 30).with_dependency("a"),
            TaskDefinition::flexible("c", 30),
        ],
    );

    let outcome = engine.generate_schedule_for_date(test_date(), &input);

    let success = outcome.success().expect("cycles still produce a schedule");
    assert_eq!(success.total_tasks, 3);
    assert_eq!(success.scheduled_tasks, 1);
    assert_eq!(success.unscheduled().count(), 2);
    assert_eq!(success.schedule[0].id(), "c");
}

#[test]
fn test_empty_day_is_a_success() {
    let engine = setup_engine();

    let outcome = engine.generate_schedule_for_date(test_date(), &ScheduleInput::default());

    let success = outcome.success().expect("empty schedule");
    assert_eq!(success.total_tasks, 0);
    assert_eq!(success.conflict_count, 0);
}

#[test]
fn test_invalid_rrule_handling() {
    for text in ["INVALID_RRULE", "FREQ=DAILY;COUNT=3", "FREQ=WEEKLY;BYDAY=ZZ"] {
        let result = RRuleParser::parse(text);
        assert!(
            matches!(result, Err(AppError::Validation { .. })),
            "{text:?} should fail validation"
        );
    }
}

#[test]
fn test_config_loading_errors() {
    let dir = tempfile::tempdir().expect("temp dir");

    let missing = settings_service::load_schedule_input(dir.path().join("absent.yaml"));
    assert!(matches!(missing, Err(AppError::Io(_))));

    let broken_yaml = dir.path().join("broken.yaml");
    std::fs::write(&broken_yaml, "templates: [ {id: a").expect("write");
    assert!(matches!(
        settings_service::load_schedule_input(&broken_yaml),
        Err(AppError::Yaml(_))
    ));

    let broken_json = dir.path().join("broken.json");
    std::fs::write(&broken_json, "{\"settings\": 5}").expect("write");
    assert!(matches!(
        settings_service::load_schedule_input(&broken_json),
        Err(AppError::Serialization(_))
    ));

    let bad_settings = dir.path().join("settings.json");
    std::fs::write(&bad_settings, r#"{"bufferMinutes": 1000}"#).expect("write");
    assert!(matches!(
        settings_service::load_settings(&bad_settings),
        Err(AppError::Validation { .. })
    ));
}
