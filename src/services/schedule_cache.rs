use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use lru::LruCache;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::models::schedule::ScheduleOutcome;

pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(31) {
    Some(capacity) => capacity,
    None => panic!("default cache capacity must be positive"),
};

/// Keeps recent successful schedules per date. Concurrent requests for the
/// same date wait on a per-date gate so only one of them generates.
pub struct ScheduleCache {
    entries: Mutex<LruCache<NaiveDate, ScheduleOutcome>>,
    in_flight: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl Default for ScheduleCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl ScheduleCache {
    pub fn new(capacity: usize) -> AppResult<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| AppError::validation("schedule cache capacity must be positive"))?;
        Ok(Self::with_capacity(capacity))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, date: NaiveDate) -> AppResult<Option<ScheduleOutcome>> {
        Ok(self.entries()?.get(&date).cloned())
    }

    /// Return the cached outcome for `date`, or run `generate` once and cache
    /// its result when it succeeded. Failures are handed back uncached.
    pub fn get_or_generate<F>(&self, date: NaiveDate, generate: F) -> AppResult<ScheduleOutcome>
    where
        F: FnOnce() -> ScheduleOutcome,
    {
        if let Some(hit) = self.get(date)? {
            debug!(target: "app::cache", %date, "schedule cache hit");
            return Ok(hit);
        }

        let gate = {
            let mut in_flight = self.in_flight()?;
            Arc::clone(in_flight.entry(date).or_default())
        };
        let outcome = {
            // The gate guards no data, so a generator that panicked leaves
            // nothing to repair
            let _turn = gate.lock().unwrap_or_else(|poisoned| {
                warn!(target: "app::cache", %date, "previous generation panicked, retrying");
                PoisonError::into_inner(poisoned)
            });

            // Another caller may have filled the entry while we waited
            match self.get(date)? {
                Some(hit) => {
                    debug!(target: "app::cache", %date, "schedule cache filled while waiting");
                    hit
                }
                None => {
                    debug!(target: "app::cache", %date, "schedule cache miss");
                    let outcome = generate();
                    if outcome.is_success() {
                        self.entries()?.put(date, outcome.clone());
                    }
                    outcome
                }
            }
        };

        let mut in_flight = self.in_flight()?;
        // One reference in the map plus ours means nobody else is waiting
        if Arc::strong_count(&gate) <= 2 {
            in_flight.remove(&date);
        }

        Ok(outcome)
    }

    pub fn invalidate(&self, date: NaiveDate) -> AppResult<()> {
        if self.entries()?.pop(&date).is_some() {
            debug!(target: "app::cache", %date, "schedule cache entry invalidated");
        }
        Ok(())
    }

    pub fn clear(&self) -> AppResult<()> {
        self.entries()?.clear();
        debug!(target: "app::cache", "schedule cache cleared");
        Ok(())
    }

    pub fn len(&self) -> AppResult<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.entries()?.is_empty())
    }

    fn entries(&self) -> AppResult<MutexGuard<'_, LruCache<NaiveDate, ScheduleOutcome>>> {
        self.entries
            .lock()
            .map_err(|_| AppError::other("schedule cache lock poisoned"))
    }

    fn in_flight(&self) -> AppResult<MutexGuard<'_, HashMap<NaiveDate, Arc<Mutex<()>>>>> {
        self.in_flight
            .lock()
            .map_err(|_| AppError::other("schedule cache lock poisoned"))
    }
}
