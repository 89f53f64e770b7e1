pub mod dependency;
pub mod recurring_task;
pub mod schedule;
pub mod settings;
pub mod task;
