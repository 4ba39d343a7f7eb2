//! Fan-out of extracted events to live subscriptions.
//!
//! Each subscription owns a bounded channel; the dispatcher pushes one
//! cycle's matching events into every channel with a per-send timeout.

mod registry;
mod response;

pub use registry::{
    DispatchReport, Subscriber, Subscription, SubscriptionId, SubscriptionRegistry, DEFAULT_BUFFER,
};
pub use response::EventResponse;
