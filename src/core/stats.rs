//! Counters shared by all workers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters, updated concurrently by workers
#[derive(Debug, Default)]
pub struct EngineStats {
    events_dispatched: AtomicU64,
    decision_failures: AtomicU64,
    actions_executed: AtomicU64,
    execution_failures: AtomicU64,
    failed_sources: AtomicU64,
}

/// Point-in-time copy of [`EngineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub events_dispatched: u64,
    pub decision_failures: u64,
    pub actions_executed: u64,
    pub execution_failures: u64,
    pub failed_sources: u64,
}

impl EngineStats {
    pub(crate) fn event_dispatched(&self) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decision_failed(&self) {
        self.decision_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn action_executed(&self) {
        self.actions_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn execution_failed(&self) {
        self.execution_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn source_failed(&self) {
        self.failed_sources.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            decision_failures: self.decision_failures.load(Ordering::Relaxed),
            actions_executed: self.actions_executed.load(Ordering::Relaxed),
            execution_failures: self.execution_failures.load(Ordering::Relaxed),
            failed_sources: self.failed_sources.load(Ordering::Relaxed),
        }
    }
}
