//! Poller statistics shared with the status endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::state::SyncState;
use crate::dispatch::DispatchReport;

/// Counters updated once per cycle.
#[derive(Debug, Default)]
pub struct SyncStatus {
    pub cycles: AtomicU64,
    pub cycles_skipped: AtomicU64,
    pub events_extracted: AtomicU64,
    pub events_delivered: AtomicU64,
    pub subscribers_dropped: AtomicU64,
    last: RwLock<LastCycle>,
}

#[derive(Debug, Default, Clone)]
struct LastCycle {
    watermark: Option<DateTime<Utc>>,
    tip: Option<String>,
}

impl SyncStatus {
    /// Create new stats tracker.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a cycle that dispatched its events.
    pub fn record_dispatch(&self, state: &SyncState, extracted: usize, report: &DispatchReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.events_extracted
            .fetch_add(extracted as u64, Ordering::Relaxed);
        self.events_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.subscribers_dropped
            .fetch_add(report.closed as u64, Ordering::Relaxed);
        self.record_state(state);
    }

    /// Record a cycle that only refreshed the watermark.
    pub fn record_skip(&self, state: &SyncState) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
        self.record_state(state);
    }

    fn record_state(&self, state: &SyncState) {
        let mut last = self.last.write();
        last.watermark = Some(state.watermark.wall());
        last.tip.clone_from(&state.last_tip);
    }

    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> SyncStatusSnapshot {
        let last = self.last.read().clone();
        SyncStatusSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            events_extracted: self.events_extracted.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            watermark: last.watermark,
            last_tip: last.tip,
        }
    }
}

/// Snapshot of poller stats.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatusSnapshot {
    pub cycles: u64,
    pub cycles_skipped: u64,
    pub events_extracted: u64,
    pub events_delivered: u64,
    pub subscribers_dropped: u64,
    pub watermark: Option<DateTime<Utc>>,
    pub last_tip: Option<String>,
}
