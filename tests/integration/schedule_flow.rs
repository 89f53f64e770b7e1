// End-to-end schedule generation through the in-memory source

use chrono::NaiveDate;
use dayplan_engine::models::recurring_task::{
    CustomPattern, InstanceRecord, InstanceStatus, RecurrenceRule,
};
use dayplan_engine::models::schedule::{
    ConflictSeverity, ConflictType, ScheduleOutcome, ScheduleSuccess,
};
use dayplan_engine::models::settings::{DailyScheduleOverride, SchedulerSettings};
use dayplan_engine::models::task::{TaskDefinition, TimeWindow};
use dayplan_engine::services::schedule_source::ScheduleInput;
use dayplan_engine::services::scheduling_engine::SchedulingEngine;
use dayplan_engine::services::settings_service;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

// 2025-03-01 is a Saturday, 2025-03-03 a Monday
fn monday() -> NaiveDate {
    date(2025, 3, 3)
}

fn setup_engine() -> SchedulingEngine {
    SchedulingEngine::default()
}

fn setup_input() -> ScheduleInput {
    let mon_wed_fri = RecurrenceRule::weekly(vec![1, 3, 5]);
    ScheduleInput::new(
        SchedulerSettings::default(),
        vec![
            TaskDefinition::fixed("standup", 15, "09:00")
                .with_title("Team standup")
                .with_recurrence(RecurrenceRule::custom(CustomPattern::Weekdays)),
            TaskDefinition::flexible("gym", 60)
                .with_window(TimeWindow::Morning)
                .with_priority(3)
                .with_recurrence(mon_wed_fri.clone()),
            TaskDefinition::flexible("review", 30)
                .with_dependency("gym")
                .with_recurrence(mon_wed_fri),
            TaskDefinition::flexible("rent", 15).with_recurrence(RecurrenceRule::monthly(1)),
            TaskDefinition::flexible("archived", 30).inactive(),
        ],
    )
}

fn expect_success(outcome: &ScheduleOutcome) -> &ScheduleSuccess {
    match outcome.success() {
        Some(success) => success,
        None => panic!("expected a schedule, got {:?}", outcome.failure()),
    }
}

fn times(success: &ScheduleSuccess) -> Vec<(&str, Option<&str>)> {
    success
        .schedule
        .iter()
        .map(|task| (task.id(), task.scheduled_time.as_deref()))
        .collect()
}

#[test]
fn test_weekday_schedule_places_anchor_and_dependent_chain() {
    let engine = setup_engine();
    let input = setup_input();

    let outcome = engine.generate_schedule_for_date(monday(), &input);
    let success = expect_success(&outcome);

    assert_eq!(
        times(success),
        vec![
            ("gym", Some("07:00")),
            ("review", Some("08:05")),
            ("standup", Some("09:00")),
        ]
    );
    assert_eq!(success.total_tasks, 3);
    assert_eq!(success.scheduled_tasks, 3);
    assert_eq!(success.conflict_count, 0);
    assert_eq!(success.date, monday());
    assert!(success.task("standup").is_some_and(|task| task.is_anchor));
    assert!(success.task("archived").is_none());
}

#[test]
fn test_saturday_only_runs_monthly_task() {
    let engine = setup_engine();
    let input = setup_input();

    let outcome = engine.generate_schedule_for_date(date(2025, 3, 1), &input);
    let success = expect_success(&outcome);

    assert_eq!(times(success), vec![("rent", Some("07:00"))]);
}

#[test]
fn test_completed_predecessor_is_reported_missing() {
    let engine = setup_engine();
    let input = setup_input().with_instance(InstanceRecord {
        template_id: "gym".to_string(),
        date: monday(),
        status: InstanceStatus::Completed,
    });

    let outcome = engine.generate_schedule_for_date(monday(), &input);
    let success = expect_success(&outcome);

    assert!(success.task("gym").is_none());
    let review = success.task("review").expect("review scheduled");
    assert_eq!(review.scheduled_time.as_deref(), Some("07:00"));
    assert_eq!(review.conflict_type, Some(ConflictType::MissingDependency));
    assert_eq!(review.conflict_severity, Some(ConflictSeverity::Medium));
    assert_eq!(success.conflict_count, 1);
}

#[test]
fn test_pending_instance_does_not_suppress_generation() {
    let engine = setup_engine();
    let input = setup_input()
        .with_instance(InstanceRecord {
            template_id: "gym".to_string(),
            date: monday(),
            status: InstanceStatus::Pending,
        })
        .with_instance(InstanceRecord {
            template_id: "standup".to_string(),
            date: date(2025, 3, 4),
            status: InstanceStatus::Skipped,
        });

    let outcome = engine.generate_schedule_for_date(monday(), &input);
    let success = expect_success(&outcome);

    assert!(success.task("gym").is_some());
    assert!(success.task("standup").is_some());
}

#[test]
fn test_daily_override_moves_the_waking_window() {
    let engine = setup_engine();
    let input = setup_input().with_override(DailyScheduleOverride {
        date: monday(),
        wake_time: "10:00".to_string(),
        sleep_time: "22:00".to_string(),
    });

    let outcome = engine.generate_schedule_for_date(monday(), &input);
    let success = expect_success(&outcome);

    assert_eq!(success.sleep_schedule.wake_time(), "10:00");
    assert_eq!(
        success.task("gym").and_then(|task| task.scheduled_time.as_deref()),
        Some("10:00")
    );
    assert_eq!(
        success.task("review").and_then(|task| task.scheduled_time.as_deref()),
        Some("11:05")
    );
    // Anchors keep their time even outside the waking window
    assert_eq!(
        success.task("standup").and_then(|task| task.scheduled_time.as_deref()),
        Some("09:00")
    );
}

#[test]
fn test_settings_buffer_drives_dependency_gap() {
    let engine = setup_engine();
    let mut input = setup_input();
    input.settings.buffer_minutes = 15;

    let outcome = engine.generate_schedule_for_date(monday(), &input);
    let success = expect_success(&outcome);

    assert_eq!(
        success.task("review").and_then(|task| task.scheduled_time.as_deref()),
        Some("08:15")
    );
}

#[test]
fn test_multi_date_generation_is_keyed_by_date() {
    let engine = setup_engine();
    let input = setup_input();
    let dates = [date(2025, 3, 4), date(2025, 3, 1), monday()];

    let outcomes = engine.generate_schedule_for_dates(&dates, &input);

    let keys: Vec<NaiveDate> = outcomes.keys().copied().collect();
    assert_eq!(keys, vec![date(2025, 3, 1), monday(), date(2025, 3, 4)]);
    assert!(outcomes.values().all(|outcome| outcome.is_success()));

    let tuesday = expect_success(&outcomes[&date(2025, 3, 4)]);
    assert_eq!(times(tuesday), vec![("standup", Some("09:00"))]);
}

#[test]
fn test_success_serializes_in_camel_case() {
    let engine = setup_engine();
    let input = setup_input();

    let outcome = engine.generate_schedule_for_date(monday(), &input);
    let value = serde_json::to_value(&outcome).expect("serialize outcome");

    assert_eq!(value["success"], true);
    assert_eq!(value["date"], "2025-03-03");
    assert_eq!(value["totalTasks"], 3);
    assert_eq!(value["sleepSchedule"]["wakeTime"], "07:00");
    assert_eq!(value["schedule"][0]["id"], "gym");
    assert_eq!(value["schedule"][0]["scheduledTime"], "07:00");
    assert_eq!(value["schedule"][0]["isFlexible"], true);
    assert!(value["schedule"][0]["instanceId"].is_string());
}

#[test]
fn test_generation_from_yaml_input_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("day.yaml");
    std::fs::write(
        &path,
        r#"
settings:
  defaultWakeTime: "06:30"
  defaultSleepTime: "22:00"
  bufferMinutes: 10
templates:
  - id: journal
    title: Journal
    durationMinutes: 20
    schedulingType: flexible
    timeWindow: evening
    recurrenceRule:
      frequency: custom
      customPattern:
        type: weekdays
  - id: lunch
    durationMinutes: 45
    schedulingType: fixed
    defaultTime: "12:30"
overrides:
  - date: "2025-03-04"
    wakeTime: "08:00"
    sleepTime: "21:00"
"#,
    )
    .expect("write input");

    let input = settings_service::load_schedule_input(&path).expect("load input");
    let engine = setup_engine();

    let monday_outcome = engine.generate_schedule_for_date(monday(), &input);
    let monday_success = expect_success(&monday_outcome);
    assert_eq!(
        times(monday_success),
        vec![("lunch", Some("12:30")), ("journal", Some("17:00"))]
    );
    assert_eq!(monday_success.sleep_schedule.wake_time(), "06:30");

    let tuesday_outcome = engine.generate_schedule_for_date(date(2025, 3, 4), &input);
    let tuesday_success = expect_success(&tuesday_outcome);
    assert_eq!(tuesday_success.sleep_schedule.sleep_time(), "21:00");

    let sunday_outcome = engine.generate_schedule_for_date(date(2025, 3, 2), &input);
    let sunday_success = expect_success(&sunday_outcome);
    assert_eq!(times(sunday_success), vec![("lunch", Some("12:30"))]);
}
