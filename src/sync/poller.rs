//! Periodic fetch, extract and dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::state::{pending_range, SyncState, Watermark};
use super::status::SyncStatus;
use crate::dispatch::SubscriptionRegistry;
use crate::events::{try_extract_history, EventCollection, EventFilter, FilterPipeline};
use crate::repository::{CommitRef, DiffSource};

/// Default poll interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Default bound on a single send to a subscriber.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Branch to track.
    pub branch: String,
    /// Time between cycles.
    pub interval: Duration,
    /// Bound on a single send to a subscriber.
    pub send_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            branch: "master".to_string(),
            interval: DEFAULT_INTERVAL,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Result of the blocking half of a cycle.
#[derive(Debug, Default)]
struct Extraction {
    events: EventCollection,
    /// Newest commit covered by `events`; `None` when nothing may be acknowledged.
    head: Option<CommitRef>,
}

/// Drives poll cycles against one working copy.
///
/// The working copy sits behind a mutex and is only touched from inside a
/// cycle, so fetches and diffs never overlap.
pub struct Poller<S: DiffSource> {
    source: Arc<Mutex<S>>,
    registry: Arc<SubscriptionRegistry>,
    filters: Arc<FilterPipeline>,
    config: PollerConfig,
    status: Arc<SyncStatus>,
}

impl<S: DiffSource> Poller<S> {
    /// Create a poller publishing to `registry`.
    pub fn new(
        source: S,
        registry: Arc<SubscriptionRegistry>,
        filters: FilterPipeline,
        config: PollerConfig,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            registry,
            filters: Arc::new(filters),
            config,
            status: SyncStatus::new(),
        }
    }

    /// Shared statistics for this poller.
    #[must_use]
    pub fn status(&self) -> Arc<SyncStatus> {
        Arc::clone(&self.status)
    }

    /// Run cycles on the configured interval until `cancel` fires.
    ///
    /// The first cycle runs immediately. Ticks missed while a cycle is still
    /// running are dropped.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            branch = %self.config.branch,
            interval = ?self.config.interval,
            "Poller started"
        );

        let mut state = SyncState::default();
        loop {
            let started = tokio::select! {
                () = cancel.cancelled() => break,
                started = ticker.tick() => started,
            };

            let span = tracing::info_span!("cycle", cycle = state.cycles + 1);
            state = self.run_cycle(state, started).instrument(span).await;

            let took = started.elapsed();
            if took > self.config.interval {
                tracing::warn!(
                    took = ?took,
                    interval = ?self.config.interval,
                    "Cycle overran the poll interval, dropping missed ticks"
                );
            }
        }

        tracing::info!(cycles = state.cycles, "Poller stopped");
    }

    /// Run one cycle starting at `started` and return the next state.
    ///
    /// Subscriptions registered after the cycle starts do not see its events.
    pub async fn run_cycle(&self, state: SyncState, started: Instant) -> SyncState {
        let subscribers = self.registry.snapshot();
        tracing::debug!(
            watermark = %state.watermark.wall(),
            subscribers = subscribers.len(),
            "Starting cycle"
        );

        let source = Arc::clone(&self.source);
        let branch = self.config.branch.clone();
        let last_tip = state.last_tip.clone();
        let extraction = tokio::task::spawn_blocking(move || {
            let mut source = source.lock();
            extract_cycle(&mut *source, &branch, last_tip.as_deref())
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Extraction task failed");
            Extraction::default()
        });

        let events = self.filters.apply(extraction.events);
        let watermark = Watermark::at(Utc::now(), started);

        if !state.watermark.has_elapsed(started, self.config.interval) {
            tracing::info!(
                previous = %state.watermark.wall(),
                "Less than one interval since last watermark, refreshing watermark only"
            );
            let next = state.refreshed(watermark);
            self.status.record_skip(&next);
            return next;
        }

        let report = self
            .registry
            .dispatch(&events, &subscribers, self.config.send_timeout)
            .await;
        let next = state.advanced(watermark, extraction.head.map(|c| c.id));
        self.status.record_dispatch(&next, events.len(), &report);

        tracing::info!(
            events = events.len(),
            delivered = report.delivered,
            subscribers = report.subscribers,
            tip = next.last_tip.as_deref().unwrap_or("none"),
            "Cycle complete"
        );
        next
    }
}

/// Fetch, pick the commit range and extract its events.
///
/// Every failure is contained here: it is logged and yields an extraction
/// that acknowledges nothing.
fn extract_cycle<S: DiffSource + ?Sized>(
    source: &mut S,
    branch: &str,
    last_tip: Option<&str>,
) -> Extraction {
    if let Err(e) = source.fetch(branch) {
        tracing::warn!(%branch, error = %e, "Fetch failed, using local history");
    }

    let commits = match source.list_commits(branch) {
        Ok(commits) => commits,
        Err(e) => {
            tracing::warn!(%branch, error = %e, "Could not list commits");
            return Extraction::default();
        }
    };

    let (range, tip_found) = pending_range(&commits, last_tip);
    if !tip_found {
        tracing::warn!(
            last_tip = last_tip.unwrap_or_default(),
            "Last dispatched commit is no longer on the branch, diffing full history"
        );
    }

    let Some(head) = range.last().cloned() else {
        return Extraction::default();
    };

    match try_extract_history(&*source, range) {
        Ok(events) => Extraction {
            events,
            head: Some(head),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Error diffing trees");
            Extraction::default()
        }
    }
}
