pub mod conflict_detector;
pub mod dependency_resolver;
pub mod recurrence_engine;
pub mod rrule_parser;
pub mod schedule_cache;
pub mod schedule_source;
pub mod schedule_utils;
pub mod scheduling_engine;
pub mod settings_service;
