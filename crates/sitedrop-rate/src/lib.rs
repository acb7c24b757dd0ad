//! Per-subject daily rate limits.
//!
//! [`RateLimiter::check`] is the admission gate: it counts one action and
//! says whether the subject is still under its daily limit. Counters reset at
//! the next UTC midnight. The read-check-increment runs inside one
//! [`CounterStore::apply`] call, so concurrent checks cannot overshoot.

mod counter;
mod error;
mod limiter;
mod store;

pub use counter::{ActionKind, Decision, RateLimitCounter, admit, next_reset};
pub use error::{Error, Result};
pub use limiter::{Clock, ManualClock, RateLimiter, SystemClock};
pub use store::{CounterStore, FileCounterStore, MemoryCounterStore, SlotUpdate};
