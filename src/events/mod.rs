//! Change events extracted from repository history.
//!
//! This module provides:
//! - Typed change events keyed by path
//! - Extraction of events from tree-to-tree deltas
//! - Composable filters applied to each cycle's events

mod extractor;
mod filter;
mod types;

pub use extractor::{extract_events, extract_history, try_extract_events, try_extract_history};
pub use filter::{EventFilter, ExcludeTopic, FilterConfig, FilterPipeline, IgnoredPaths};
pub use types::{ChangeEvent, EventCollection, Topic, OLD_PATH_KEY};
