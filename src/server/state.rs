//! Shared handler state.

use std::sync::Arc;

use crate::dispatch::SubscriptionRegistry;
use crate::sync::SyncStatus;

/// State handed to every route.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live subscriptions fed by the poller.
    pub registry: Arc<SubscriptionRegistry>,
    /// Poller statistics.
    pub status: Arc<SyncStatus>,
}

impl AppState {
    /// Create handler state from the poller's registry and statistics.
    #[must_use]
    pub const fn new(registry: Arc<SubscriptionRegistry>, status: Arc<SyncStatus>) -> Self {
        Self { registry, status }
    }
}
