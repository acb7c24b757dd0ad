use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::counter::{ActionKind, Decision, RateLimitCounter, admit};
use crate::error::Result;
use crate::store::CounterStore;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|guard| *guard).unwrap_or_else(|_| Utc::now())
    }
}

/// Admission gate in front of the upload pipeline.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Count one `action_kind` for `subject_id` if it is still under `limit` today.
    pub fn check(&self, subject_id: &str, action_kind: ActionKind, limit: u32) -> Result<Decision> {
        let now = self.clock.now();
        let mut update = |slot: &mut Option<RateLimitCounter>| {
            admit(slot, subject_id, action_kind, limit, now)
        };
        let decision = self.store.apply(subject_id, action_kind, &mut update)?;

        if decision.allowed {
            tracing::debug!(
                subject = subject_id,
                action = %action_kind,
                remaining = decision.remaining,
                "rate limit admitted"
            );
        } else {
            tracing::warn!(
                subject = subject_id,
                action = %action_kind,
                limit,
                reset_at = %decision.reset_at,
                "rate limit exceeded"
            );
        }
        Ok(decision)
    }

    /// Current counters for `subject_id`. Counters past their reset are reported as zero.
    pub fn usage(&self, subject_id: &str) -> Result<Vec<RateLimitCounter>> {
        let now = self.clock.now();
        Ok(self
            .store
            .counters(subject_id)?
            .into_iter()
            .map(|mut counter| {
                if counter.is_expired(now) {
                    counter.count = 0;
                }
                counter
            })
            .collect())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish_non_exhaustive()
    }
}
