use serde::{Deserialize, Serialize};

use crate::models::recurring_task::RecurrenceRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingType {
    Fixed,
    Flexible,
}

/// Named part of the day in which a flexible task may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Morning,
    Afternoon,
    Evening,
    #[default]
    Anytime,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::Morning,
        TimeWindow::Afternoon,
        TimeWindow::Evening,
        TimeWindow::Anytime,
    ];

    /// Start and end bounds in minutes from midnight, half-open.
    pub fn bounds(self) -> (u32, u32) {
        match self {
            TimeWindow::Morning => (6 * 60, 12 * 60),
            TimeWindow::Afternoon => (12 * 60, 17 * 60),
            TimeWindow::Evening => (17 * 60, 22 * 60),
            TimeWindow::Anytime => (0, 24 * 60),
        }
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeWindow::Morning => write!(f, "morning"),
            TimeWindow::Afternoon => write!(f, "afternoon"),
            TimeWindow::Evening => write!(f, "evening"),
            TimeWindow::Anytime => write!(f, "anytime"),
        }
    }
}

/// Recurring task template the engine schedules from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub duration_minutes: u32,
    pub scheduling_type: SchedulingType,
    #[serde(default)]
    pub default_time: Option<String>,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub depends_on: Option<String>,
    #[serde(default)]
    pub recurrence_rule: RecurrenceRule,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TaskDefinition {
    /// Create a flexible task that may start anywhere in the waking day
    pub fn flexible(id: impl Into<String>, duration_minutes: u32) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            duration_minutes,
            scheduling_type: SchedulingType::Flexible,
            default_time: None,
            time_window: None,
            priority: 0,
            is_mandatory: false,
            depends_on: None,
            recurrence_rule: RecurrenceRule::default(),
            is_active: true,
        }
    }

    /// Create a fixed task pinned to `default_time`
    pub fn fixed(
        id: impl Into<String>,
        duration_minutes: u32,
        default_time: impl Into<String>,
    ) -> Self {
        Self {
            scheduling_type: SchedulingType::Fixed,
            default_time: Some(default_time.into()),
            ..Self::flexible(id, duration_minutes)
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn with_dependency(mut self, predecessor_id: impl Into<String>) -> Self {
        self.depends_on = Some(predecessor_id.into());
        self
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence_rule = rule;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.is_mandatory = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn is_fixed(&self) -> bool {
        self.scheduling_type == SchedulingType::Fixed
    }

    pub fn is_flexible(&self) -> bool {
        self.scheduling_type == SchedulingType::Flexible
    }

    pub fn window(&self) -> TimeWindow {
        self.time_window.unwrap_or_default()
    }

    /// Ids this task must wait for. Placement and ordering go through this
    /// accessor so a multi-parent model only has to change it.
    pub fn predecessors(&self) -> impl Iterator<Item = &str> {
        self.depends_on.as_deref().into_iter()
    }
}
