//! Turns tree deltas into change events.

use std::path::Path;

use super::types::{ChangeEvent, EventCollection, Topic};
use crate::repository::{CommitRef, Delta, DiffSource};
use crate::Result;

/// Extract events for the whole span of `commits`, first to last.
///
/// Fewer than two commits means there is no baseline to compare against
/// yet, which yields an empty collection. Diff failures are logged and
/// also yield an empty collection.
pub fn extract_history<S: DiffSource + ?Sized>(
    source: &S,
    commits: &[CommitRef],
) -> EventCollection {
    try_extract_history(source, commits).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Error diffing trees");
        EventCollection::new()
    })
}

/// Like [`extract_history`], but reports diff failures to the caller.
///
/// # Errors
///
/// Returns an error if the diff source cannot diff the two trees.
pub fn try_extract_history<S: DiffSource + ?Sized>(
    source: &S,
    commits: &[CommitRef],
) -> Result<EventCollection> {
    match (commits.first(), commits.last()) {
        (Some(old), Some(new)) if commits.len() >= 2 => try_extract_events(source, old, new),
        _ => {
            tracing::info!(commits = commits.len(), "No commits found to sync contents");
            Ok(EventCollection::new())
        }
    }
}

/// Extract events between two commits.
///
/// Diff failures are logged and produce an empty collection; unreadable
/// files produce events without contents.
pub fn extract_events<S: DiffSource + ?Sized>(
    source: &S,
    old: &CommitRef,
    new: &CommitRef,
) -> EventCollection {
    try_extract_events(source, old, new).unwrap_or_else(|e| {
        tracing::warn!(old = %old.id, new = %new.id, error = %e, "Error diffing trees");
        EventCollection::new()
    })
}

/// Like [`extract_events`], but reports diff failures to the caller.
///
/// # Errors
///
/// Returns an error if the diff source cannot diff the two trees.
pub fn try_extract_events<S: DiffSource + ?Sized>(
    source: &S,
    old: &CommitRef,
    new: &CommitRef,
) -> Result<EventCollection> {
    let deltas = source.diff_tree_to_tree(old, new)?;

    let root = source.workdir();
    let mut events = EventCollection::new();
    for delta in &deltas {
        if let Some(event) = event_for(delta, root) {
            events.insert(event);
        }
    }

    tracing::debug!(
        old = %old.id,
        new = %new.id,
        deltas = deltas.len(),
        events = events.len(),
        "Extracted change events"
    );
    Ok(events)
}

/// Build the event for one delta, reading current content from `root`.
fn event_for(delta: &Delta, root: &Path) -> Option<ChangeEvent> {
    let Some(path) = delta.path() else {
        tracing::warn!(status = %delta.status, "Delta has no path, skipping");
        return None;
    };

    let mut event = ChangeEvent::new(path, delta.status);
    if delta.status != Topic::Deleted {
        event.contents = read_contents(root, path);
    }
    if delta.status.tracks_old_path() {
        if let Some(old_path) = &delta.old_path {
            event = event.with_old_path(old_path.as_str());
        }
    }
    Some(event)
}

fn read_contents(root: &Path, path: &str) -> Option<Vec<u8>> {
    match std::fs::read(root.join(path)) {
        Ok(contents) => Some(contents),
        Err(e) => {
            tracing::warn!(%path, error = %e, "Could not read contents, sending event without them");
            None
        }
    }
}
