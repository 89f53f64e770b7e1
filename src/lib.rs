//! Daily task scheduling engine.
//!
//! Task templates are filtered by their recurrence rules for a date, ordered
//! by their dependencies, and placed into the waking day around fixed-time
//! anchors. The resulting schedule carries conflict annotations for whatever
//! could not be resolved.

pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{AppError, AppResult};
pub use services::schedule_source::{ScheduleInput, ScheduleSource};
pub use services::scheduling_engine::{PlacementConfig, SchedulingEngine};
