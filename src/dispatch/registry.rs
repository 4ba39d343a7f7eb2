//! Live subscriptions and per-cycle fan-out.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::response::EventResponse;
use crate::events::{EventCollection, Topic};

/// Default per-subscription channel capacity.
pub const DEFAULT_BUFFER: usize = 64;

/// Identifier of one subscription.
pub type SubscriptionId = Uuid;

/// Sending half of a subscription, as seen by the dispatcher.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriptionId,
    topics: Arc<BTreeSet<Topic>>,
    tx: mpsc::Sender<EventResponse>,
}

impl Subscriber {
    /// Subscription id.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether this subscriber asked for `topic`.
    #[must_use]
    pub fn wants(&self, topic: Topic) -> bool {
        self.topics.contains(&topic)
    }
}

/// Receiving half of a subscription.
///
/// Dropping it deregisters the subscription.
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<EventResponse>,
    registry: Arc<SubscriptionRegistry>,
}

impl Subscription {
    /// Subscription id.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the dispatcher dropped us.
    pub async fn recv(&mut self) -> Option<EventResponse> {
        self.rx.recv().await
    }

    /// Take an already-queued event without waiting.
    pub fn try_recv(&mut self) -> Option<EventResponse> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(self.id);
    }
}

/// Outcome of delivering one cycle to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Complete(usize),
    Closed(usize),
    TimedOut(usize),
}

/// Summary of one dispatch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Subscribers the cycle was offered to.
    pub subscribers: usize,
    /// Events successfully queued across all subscribers.
    pub delivered: usize,
    /// Subscribers found disconnected and removed.
    pub closed: usize,
    /// Subscribers whose delivery was cut short by the send timeout.
    pub timed_out: usize,
}

/// All live subscriptions.
#[derive(Debug)]
pub struct SubscriptionRegistry {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    buffer: usize,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl SubscriptionRegistry {
    /// Create a registry whose subscriptions buffer up to `buffer` events.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a subscription for `topics`.
    ///
    /// An empty topic set is accepted and never receives anything.
    pub fn subscribe(
        self: &Arc<Self>,
        topics: impl IntoIterator<Item = Topic>,
    ) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        let topics: BTreeSet<Topic> = topics.into_iter().collect();

        tracing::info!(subscription = %id, ?topics, "Subscription registered");
        self.subscribers.write().insert(
            id,
            Subscriber {
                id,
                topics: Arc::new(topics),
                tx,
            },
        );

        Subscription {
            id,
            rx,
            registry: Arc::clone(self),
        }
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::info!(subscription = %id, "Subscription removed");
        }
    }

    /// Subscribers registered right now.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().values().cloned().collect()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Check if there are no live subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Deliver `events` to each of `subscribers`, concurrently across subscribers.
    ///
    /// Each subscriber gets the events it asked for in collection order.
    /// A send that does not complete within `send_timeout` ends that
    /// subscriber's delivery for this cycle; a closed channel removes the
    /// subscription. Neither affects other subscribers.
    pub async fn dispatch(
        &self,
        events: &EventCollection,
        subscribers: &[Subscriber],
        send_timeout: Duration,
    ) -> DispatchReport {
        let mut report = DispatchReport {
            subscribers: subscribers.len(),
            ..DispatchReport::default()
        };
        if events.is_empty() || subscribers.is_empty() {
            return report;
        }

        let outcomes = join_all(
            subscribers
                .iter()
                .map(|subscriber| deliver(subscriber, events, send_timeout)),
        )
        .await;

        for (subscriber, outcome) in subscribers.iter().zip(outcomes) {
            match outcome {
                Delivery::Complete(sent) => report.delivered += sent,
                Delivery::Closed(sent) => {
                    report.delivered += sent;
                    report.closed += 1;
                    self.unsubscribe(subscriber.id);
                }
                Delivery::TimedOut(sent) => {
                    report.delivered += sent;
                    report.timed_out += 1;
                }
            }
        }

        tracing::debug!(
            subscribers = report.subscribers,
            delivered = report.delivered,
            closed = report.closed,
            timed_out = report.timed_out,
            "Dispatched cycle"
        );
        report
    }
}

async fn deliver(subscriber: &Subscriber, events: &EventCollection, send_timeout: Duration) -> Delivery {
    let mut sent = 0;
    for event in events.iter().filter(|e| subscriber.wants(e.topic)) {
        let response = EventResponse::from(event);
        match tokio::time::timeout(send_timeout, subscriber.tx.send(response)).await {
            Ok(Ok(())) => sent += 1,
            Ok(Err(_)) => {
                tracing::warn!(subscription = %subscriber.id, "Failed to send response: subscriber disconnected");
                return Delivery::Closed(sent);
            }
            Err(_) => {
                tracing::warn!(
                    subscription = %subscriber.id,
                    path = %event.path,
                    timeout = ?send_timeout,
                    "Send timed out, skipping rest of cycle for subscriber"
                );
                return Delivery::TimedOut(sent);
            }
        }
    }
    Delivery::Complete(sent)
}
