use std::sync::Arc;
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use sitedrop_rate::{
    ActionKind, CounterStore, FileCounterStore, ManualClock, MemoryCounterStore, RateLimiter,
};
use tempfile::tempdir;

const LIMIT: u32 = 10;
const THREADS: usize = 8;
const CALLS_PER_THREAD: usize = 5;

fn hammer(limiter: &RateLimiter) -> usize {
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let limiter = limiter.clone();
            thread::spawn(move || {
                (0..CALLS_PER_THREAD)
                    .filter(|_| {
                        limiter
                            .check("alice", ActionKind::Upload, LIMIT)
                            .unwrap()
                            .allowed
                    })
                    .count()
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).sum()
}

fn limiter_with(store: Arc<dyn CounterStore>) -> (RateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap(),
    ));
    (RateLimiter::with_clock(store, clock.clone()), clock)
}

#[test]
fn memory_store_never_admits_past_limit() {
    let (limiter, _) = limiter_with(Arc::new(MemoryCounterStore::new()));
    assert_eq!(hammer(&limiter), LIMIT as usize);
    assert_eq!(limiter.usage("alice").unwrap()[0].count, LIMIT);
}

#[test]
fn file_store_never_admits_past_limit() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileCounterStore::new(dir.path().join("rate-limits.json")));
    let (limiter, clock) = limiter_with(store);

    assert_eq!(hammer(&limiter), LIMIT as usize);
    assert_eq!(limiter.usage("alice").unwrap()[0].count, LIMIT);

    clock.set(Utc.with_ymd_and_hms(2026, 7, 1, 8, 0, 0).unwrap() + Duration::days(1));
    let decision = limiter.check("alice", ActionKind::Upload, LIMIT).unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.remaining, LIMIT - 1);
    assert_eq!(limiter.usage("alice").unwrap()[0].count, 1);
}
