//! Change event types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Metadata key carrying the prior path of renamed and deleted files.
pub const OLD_PATH_KEY: &str = "old-path";

/// Kind of change a path went through between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topic {
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
}

impl Topic {
    /// Every topic, in the order subscribers receive them by default.
    pub const ALL: [Self; 5] = [
        Self::Added,
        Self::Deleted,
        Self::Modified,
        Self::Renamed,
        Self::Copied,
    ];

    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Deleted => "Deleted",
            Self::Modified => "Modified",
            Self::Renamed => "Renamed",
            Self::Copied => "Copied",
        }
    }

    /// Whether events of this topic carry the `old-path` metadata entry.
    #[must_use]
    pub const fn tracks_old_path(self) -> bool {
        matches!(self, Self::Renamed | Self::Deleted)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s.trim())
            .ok_or_else(|| {
                Error::config(format!(
                    "unknown topic '{s}', must be one of: Added, Deleted, Modified, Renamed, Copied"
                ))
            })
    }
}

/// A single classified change to one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path relative to the working copy root.
    pub path: String,
    /// Change classification.
    pub topic: Topic,
    /// File content at extraction time, absent when it could not be read.
    pub contents: Option<Vec<u8>>,
    /// Extra attributes, currently only `old-path`.
    pub metadata: BTreeMap<String, String>,
}

impl ChangeEvent {
    /// Create an event with no contents and empty metadata.
    pub fn new(path: impl Into<String>, topic: Topic) -> Self {
        Self {
            path: path.into(),
            topic,
            contents: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach file contents.
    #[must_use]
    pub fn with_contents(mut self, contents: Option<Vec<u8>>) -> Self {
        self.contents = contents;
        self
    }

    /// Record the path the file had before this change.
    #[must_use]
    pub fn with_old_path(mut self, old_path: impl Into<String>) -> Self {
        self.metadata
            .insert(OLD_PATH_KEY.to_string(), old_path.into());
        self
    }

    /// The prior path, if recorded.
    #[must_use]
    pub fn old_path(&self) -> Option<&str> {
        self.metadata.get(OLD_PATH_KEY).map(String::as_str)
    }
}

/// Events of one extraction cycle, keyed by path.
///
/// Iteration follows the order paths were first seen. Inserting an event
/// for a path already present replaces it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCollection {
    events: IndexMap<String, ChangeEvent>,
}

impl EventCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event, replacing any earlier event for the same path.
    pub fn insert(&mut self, event: ChangeEvent) -> Option<ChangeEvent> {
        self.events.insert(event.path.clone(), event)
    }

    /// Look up the event for a path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ChangeEvent> {
        self.events.get(path)
    }

    /// Remove the event for a path.
    pub fn remove(&mut self, path: &str) -> Option<ChangeEvent> {
        self.events.shift_remove(path)
    }

    /// Keep only the events matching a predicate, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&ChangeEvent) -> bool) {
        self.events.retain(|_, event| keep(event));
    }

    /// Iterate events in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.events.values()
    }

    /// Paths in enumeration order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<ChangeEvent> for EventCollection {
    fn from_iter<I: IntoIterator<Item = ChangeEvent>>(iter: I) -> Self {
        let mut collection = Self::new();
        for event in iter {
            collection.insert(event);
        }
        collection
    }
}

impl IntoIterator for EventCollection {
    type Item = ChangeEvent;
    type IntoIter = indexmap::map::IntoValues<String, ChangeEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_round_trip_names() {
        for topic in Topic::ALL {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
        }
    }

    #[test]
    fn test_topic_parse_rejects_unknown() {
        let err = "Moved".parse::<Topic>().unwrap_err();
        assert!(err.to_string().contains("unknown topic"));
    }

    #[test]
    fn test_topic_is_case_sensitive() {
        assert!("added".parse::<Topic>().is_err());
    }

    #[test]
    fn test_tracks_old_path() {
        assert!(Topic::Renamed.tracks_old_path());
        assert!(Topic::Deleted.tracks_old_path());
        assert!(!Topic::Added.tracks_old_path());
        assert!(!Topic::Modified.tracks_old_path());
        assert!(!Topic::Copied.tracks_old_path());
    }

    #[test]
    fn test_event_builders() {
        let event = ChangeEvent::new("y.txt", Topic::Renamed)
            .with_contents(Some(b"hi".to_vec()))
            .with_old_path("x.txt");

        assert_eq!(event.old_path(), Some("x.txt"));
        assert_eq!(event.contents.as_deref(), Some(&b"hi"[..]));
    }

    #[test]
    fn test_collection_last_write_wins_keeps_position() {
        let mut collection = EventCollection::new();
        collection.insert(ChangeEvent::new("a.txt", Topic::Added));
        collection.insert(ChangeEvent::new("b.txt", Topic::Added));
        let previous = collection.insert(ChangeEvent::new("a.txt", Topic::Modified));

        assert_eq!(previous.map(|e| e.topic), Some(Topic::Added));
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get("a.txt").unwrap().topic, Topic::Modified);
        assert_eq!(collection.paths().collect::<Vec<_>>(), ["a.txt", "b.txt"]);
    }

    #[test]
    fn test_collection_retain_and_remove() {
        let mut collection: EventCollection = [
            ChangeEvent::new("a.txt", Topic::Added),
            ChangeEvent::new("b.txt", Topic::Deleted),
            ChangeEvent::new("c.txt", Topic::Added),
        ]
        .into_iter()
        .collect();

        collection.retain(|e| e.topic == Topic::Added);
        assert_eq!(collection.paths().collect::<Vec<_>>(), ["a.txt", "c.txt"]);

        assert!(collection.remove("a.txt").is_some());
        assert!(collection.remove("a.txt").is_none());
        assert_eq!(collection.len(), 1);
    }
}
