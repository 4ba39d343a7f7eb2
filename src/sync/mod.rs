//! Poll scheduling and the sync watermark.
//!
//! This module provides:
//! - `SyncState`, threaded explicitly from one cycle to the next
//! - `Poller`, the single background task that fetches, extracts and dispatches
//! - `SyncStatus`, counters exposed on the status endpoint

mod poller;
mod state;
mod status;

pub use poller::{Poller, PollerConfig, DEFAULT_INTERVAL, DEFAULT_SEND_TIMEOUT};
pub use state::{pending_range, SyncState, Watermark};
pub use status::{SyncStatus, SyncStatusSnapshot};
