//! Sync watermark and per-cycle state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::repository::CommitRef;

/// Boundary of already-observed changes.
///
/// Carries both a wall-clock time for reporting and a monotonic instant
/// for elapsed-time checks. Starts at the epoch with no instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Watermark {
    wall: DateTime<Utc>,
    mono: Option<Instant>,
}

impl Watermark {
    /// Watermark taken at the given moment.
    #[must_use]
    pub const fn at(wall: DateTime<Utc>, mono: Instant) -> Self {
        Self {
            wall,
            mono: Some(mono),
        }
    }

    /// Wall-clock time of the watermark.
    #[must_use]
    pub const fn wall(&self) -> DateTime<Utc> {
        self.wall
    }

    /// Whether at least `interval` has passed between the watermark and `now`.
    ///
    /// Always true before the first cycle.
    #[must_use]
    pub fn has_elapsed(&self, now: Instant, interval: Duration) -> bool {
        self.mono
            .map_or(true, |last| now.saturating_duration_since(last) >= interval)
    }
}

/// State threaded from one poll cycle to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// When the last cycle started.
    pub watermark: Watermark,
    /// Newest commit whose changes have been dispatched.
    pub last_tip: Option<String>,
    /// Cycles run so far.
    pub cycles: u64,
}

impl SyncState {
    /// Move the watermark without acknowledging any commits.
    #[must_use]
    pub fn refreshed(self, watermark: Watermark) -> Self {
        Self {
            watermark,
            cycles: self.cycles + 1,
            ..self
        }
    }

    /// Move the watermark and record `tip` as dispatched.
    ///
    /// A cycle that produced no tip keeps the previous one.
    #[must_use]
    pub fn advanced(self, watermark: Watermark, tip: Option<String>) -> Self {
        Self {
            watermark,
            last_tip: tip.or(self.last_tip),
            cycles: self.cycles + 1,
        }
    }
}

/// Commits a cycle should diff: from the last dispatched tip through the newest.
///
/// Falls back to the whole history when there is no tip yet or it is no
/// longer reachable. The returned flag reports whether the tip was found.
#[must_use]
pub fn pending_range<'a>(commits: &'a [CommitRef], last_tip: Option<&str>) -> (&'a [CommitRef], bool) {
    match last_tip {
        None => (commits, true),
        Some(tip) => commits
            .iter()
            .position(|c| c.id == tip)
            .map_or((commits, false), |start| (&commits[start..], true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(id: &str) -> CommitRef {
        CommitRef {
            id: id.to_string(),
            tree: format!("tree-{id}"),
            time: Utc::now(),
        }
    }

    #[test]
    fn test_epoch_watermark_always_elapsed() {
        let watermark = Watermark::default();
        assert_eq!(watermark.wall().timestamp(), 0);
        assert!(watermark.has_elapsed(Instant::now(), Duration::from_secs(300)));
    }

    #[test]
    fn test_has_elapsed_is_monotonic() {
        let start = Instant::now();
        let watermark = Watermark::at(Utc::now(), start);
        let interval = Duration::from_secs(300);

        assert!(!watermark.has_elapsed(start, interval));
        assert!(!watermark.has_elapsed(start + Duration::from_secs(299), interval));
        assert!(watermark.has_elapsed(start + interval, interval));
        assert!(watermark.has_elapsed(start + Duration::from_secs(3600), interval));
    }

    #[test]
    fn test_has_elapsed_across_minute_boundary() {
        // 10:00:59 -> 10:01:01 style wrap must not matter.
        let start = Instant::now();
        let watermark = Watermark::at(Utc::now(), start);
        assert!(watermark.has_elapsed(start + Duration::from_secs(2), Duration::from_secs(1)));
    }

    #[test]
    fn test_refreshed_keeps_tip() {
        let state = SyncState {
            last_tip: Some("abc".to_string()),
            ..SyncState::default()
        };
        let next = state.refreshed(Watermark::at(Utc::now(), Instant::now()));
        assert_eq!(next.last_tip.as_deref(), Some("abc"));
        assert_eq!(next.cycles, 1);
    }

    #[test]
    fn test_advanced_without_tip_keeps_previous() {
        let state = SyncState {
            last_tip: Some("abc".to_string()),
            ..SyncState::default()
        };
        let now = Watermark::at(Utc::now(), Instant::now());
        assert_eq!(state.clone().advanced(now, None).last_tip.as_deref(), Some("abc"));
        assert_eq!(
            state.advanced(now, Some("def".to_string())).last_tip.as_deref(),
            Some("def")
        );
    }

    #[test]
    fn test_pending_range() {
        let commits = vec![commit("c1"), commit("c2"), commit("c3")];

        let (range, found) = pending_range(&commits, None);
        assert_eq!(range.len(), 3);
        assert!(found);

        let (range, found) = pending_range(&commits, Some("c2"));
        assert_eq!(range.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(), ["c2", "c3"]);
        assert!(found);

        let (range, _) = pending_range(&commits, Some("c3"));
        assert_eq!(range.len(), 1);

        let (range, found) = pending_range(&commits, Some("rewritten"));
        assert_eq!(range.len(), 3);
        assert!(!found);
    }
}
