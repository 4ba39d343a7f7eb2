//! Event filtering with gitignore-style path patterns.

use std::collections::BTreeSet;
use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};

use super::types::{EventCollection, Topic};
use crate::Result;

/// Filters recognised by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Exact paths whose events are dropped.
    pub ignored_paths: Vec<String>,
    /// Gitignore-style patterns whose matching paths are dropped.
    pub ignore_patterns: Vec<String>,
    /// Topics whose events are dropped.
    pub excluded_topics: Vec<Topic>,
}

/// A transform over one cycle's events.
pub trait EventFilter: Send + Sync {
    /// Return the collection with this filter's exclusions removed.
    fn apply(&self, events: EventCollection) -> EventCollection;
}

/// Drops events for ignored paths.
#[derive(Debug)]
pub struct IgnoredPaths {
    paths: BTreeSet<String>,
    patterns: Option<Gitignore>,
}

impl IgnoredPaths {
    /// Ignore exactly the listed paths.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            patterns: None,
        }
    }

    /// Also ignore paths matching gitignore-style patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is invalid.
    pub fn with_patterns(mut self, patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(self);
        }

        // Paths are relative to the working copy, so match against an empty root.
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            builder
                .add_line(None, pattern)
                .map_err(|e| crate::Error::config(format!("invalid ignore pattern: {e}")))?;
        }
        let gitignore = builder
            .build()
            .map_err(|e| crate::Error::config(format!("failed to build ignore patterns: {e}")))?;

        self.patterns = Some(gitignore);
        Ok(self)
    }

    fn is_ignored(&self, path: &str) -> bool {
        if self.paths.contains(path) {
            return true;
        }
        self.patterns.as_ref().is_some_and(|gi| {
            gi.matched_path_or_any_parents(Path::new(path), false)
                .is_ignore()
        })
    }
}

impl EventFilter for IgnoredPaths {
    fn apply(&self, mut events: EventCollection) -> EventCollection {
        events.retain(|event| !self.is_ignored(&event.path));
        events
    }
}

/// Drops every event of one topic.
#[derive(Debug, Clone, Copy)]
pub struct ExcludeTopic(pub Topic);

impl EventFilter for ExcludeTopic {
    fn apply(&self, mut events: EventCollection) -> EventCollection {
        events.retain(|event| event.topic != self.0);
        events
    }
}

/// Filters applied in sequence.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn EventFilter>>,
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl FilterPipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the pipeline described by a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore pattern is invalid.
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let mut pipeline = Self::new();

        if !config.ignored_paths.is_empty() || !config.ignore_patterns.is_empty() {
            let ignored = IgnoredPaths::new(config.ignored_paths.iter().cloned())
                .with_patterns(&config.ignore_patterns)?;
            pipeline = pipeline.then(ignored);
        }

        let topics: BTreeSet<Topic> = config.excluded_topics.iter().copied().collect();
        for topic in topics {
            pipeline = pipeline.then(ExcludeTopic(topic));
        }

        Ok(pipeline)
    }

    /// Append a filter.
    #[must_use]
    pub fn then(mut self, filter: impl EventFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if the pipeline has no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl EventFilter for FilterPipeline {
    fn apply(&self, events: EventCollection) -> EventCollection {
        self.filters
            .iter()
            .fold(events, |events, filter| filter.apply(events))
    }
}
