//! In-process dispatch counters.
//!
//! Totals are plain atomics; the per-command breakdown lives in a lazily created map.
//! Nothing here is exported anywhere yet; the console `stats` command prints a snapshot.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::command::outcome::Outcome;

static DISPATCHED: AtomicU64 = AtomicU64::new(0);
static SUCCEEDED: AtomicU64 = AtomicU64::new(0);
static FAILED: AtomicU64 = AtomicU64::new(0);
static DENIED: AtomicU64 = AtomicU64::new(0);
static WARMUPS_STARTED: AtomicU64 = AtomicU64::new(0);
static PERSISTENCE_FAILURES: AtomicU64 = AtomicU64::new(0);

static COMMAND_COUNTERS: OnceLock<Mutex<HashMap<String, CommandCounter>>> = OnceLock::new();

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommandCounter {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub denied: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub denied: u64,
    pub warmups_started: u64,
    pub persistence_failures: u64,
}

fn counters() -> MutexGuard<'static, HashMap<String, CommandCounter>> {
    COMMAND_COUNTERS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// Count one final outcome. `command` is `None` when the name did not resolve.
pub fn record_outcome(command: Option<&str>, outcome: &Outcome) {
    fn bump(command: Option<&str>, f: fn(&mut CommandCounter)) {
        if let Some(name) = command {
            f(counters().entry(name.to_string()).or_default());
        }
    }
    match outcome {
        Outcome::Success(_) => {
            SUCCEEDED.fetch_add(1, Ordering::Relaxed);
            bump(command, |c| c.succeeded += 1);
        }
        Outcome::Failure { .. } => {
            FAILED.fetch_add(1, Ordering::Relaxed);
            bump(command, |c| c.failed += 1);
        }
        Outcome::Denied(_) => {
            DENIED.fetch_add(1, Ordering::Relaxed);
            bump(command, |c| c.denied += 1);
        }
        Outcome::WarmupStarted { .. } => {
            WARMUPS_STARTED.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub fn record_dispatch(command: Option<&str>) {
    DISPATCHED.fetch_add(1, Ordering::Relaxed);
    if let Some(name) = command {
        counters().entry(name.to_string()).or_default().dispatched += 1;
    }
}

pub fn inc_persistence_failures() {
    PERSISTENCE_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        dispatched: DISPATCHED.load(Ordering::Relaxed),
        succeeded: SUCCEEDED.load(Ordering::Relaxed),
        failed: FAILED.load(Ordering::Relaxed),
        denied: DENIED.load(Ordering::Relaxed),
        warmups_started: WARMUPS_STARTED.load(Ordering::Relaxed),
        persistence_failures: PERSISTENCE_FAILURES.load(Ordering::Relaxed),
    }
}

pub fn command_counter(name: &str) -> CommandCounter {
    counters().get(name).copied().unwrap_or_default()
}

/// Per-command counters sorted by name.
pub fn command_counters() -> Vec<(String, CommandCounter)> {
    let mut out: Vec<_> = counters().iter().map(|(k, v)| (k.clone(), *v)).collect();
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}
