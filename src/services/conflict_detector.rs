use std::collections::HashMap;

use tracing::debug;

use crate::models::schedule::{ConflictRecord, ConflictSeverity, ConflictType, ScheduledTask};
use crate::services::schedule_utils;

/// Annotate every task in `schedule` with the conflicts it takes part in.
///
/// Previous annotations are discarded first, so running this twice yields
/// the same result. Tasks without a parseable `scheduled_time` take no part in
/// overlap or ordering checks but can still reference a missing predecessor.
pub fn detect_and_mark_conflicts(mut schedule: Vec<ScheduledTask>) -> Vec<ScheduledTask> {
    for task in &mut schedule {
        task.clear_conflicts();
    }

    let records = collect_conflicts(&schedule);
    let mut conflicted = 0usize;

    for (task, task_records) in schedule.iter_mut().zip(records) {
        if let Some((conflict_type, severity)) = summarize(&task_records) {
            task.has_conflicts = true;
            task.conflict_type = Some(conflict_type);
            task.conflict_severity = Some(severity);
            task.conflicts = task_records;
            conflicted += 1;
        }
    }

    debug!(
        target: "app::scheduler",
        tasks = schedule.len(),
        conflicted,
        "conflict detection finished"
    );

    schedule
}

fn collect_conflicts(schedule: &[ScheduledTask]) -> Vec<Vec<ConflictRecord>> {
    let intervals: Vec<Option<(u32, u32)>> = schedule.iter().map(ScheduledTask::interval).collect();
    let mut records: Vec<Vec<ConflictRecord>> = vec![Vec::new(); schedule.len()];

    for i in 0..schedule.len() {
        let Some((a_start, a_end)) = intervals[i] else {
            continue;
        };
        for j in (i + 1)..schedule.len() {
            let Some((b_start, b_end)) = intervals[j] else {
                continue;
            };
            if !schedule_utils::has_time_overlap(a_start, a_end, b_start, b_end) {
                continue;
            }

            let minutes = schedule_utils::overlap_minutes(a_start, a_end, b_start, b_end);
            let severity = ConflictSeverity::for_overlap(minutes);
            records[i].push(ConflictRecord {
                conflict_type: ConflictType::TimeOverlap,
                related_task_id: schedule[j].id().to_string(),
                minutes,
                severity,
            });
            records[j].push(ConflictRecord {
                conflict_type: ConflictType::TimeOverlap,
                related_task_id: schedule[i].id().to_string(),
                minutes,
                severity,
            });
        }
    }

    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for (idx, task) in schedule.iter().enumerate() {
        index_of.entry(task.id()).or_insert(idx);
    }

    for (idx, task) in schedule.iter().enumerate() {
        for predecessor in task.task.predecessors() {
            let Some(&pred_idx) = index_of.get(predecessor) else {
                records[idx].push(ConflictRecord {
                    conflict_type: ConflictType::MissingDependency,
                    related_task_id: predecessor.to_string(),
                    minutes: 0,
                    severity: ConflictSeverity::Medium,
                });
                continue;
            };

            if let (Some((start, _)), Some((_, pred_end))) = (intervals[idx], intervals[pred_idx]) {
                if start < pred_end {
                    records[idx].push(ConflictRecord {
                        conflict_type: ConflictType::DependencyViolation,
                        related_task_id: predecessor.to_string(),
                        minutes: pred_end - start,
                        severity: ConflictSeverity::High,
                    });
                }
            }
        }
    }

    records
}

/// A single conflict kind keeps its name; mixed kinds become `Multiple`.
fn summarize(records: &[ConflictRecord]) -> Option<(ConflictType, ConflictSeverity)> {
    let first = records.first()?;
    let conflict_type = if records
        .iter()
        .all(|record| record.conflict_type == first.conflict_type)
    {
        first.conflict_type
    } else {
        ConflictType::Multiple
    };
    let severity = records.iter().map(|record| record.severity).max()?;
    Some((conflict_type, severity))
}
