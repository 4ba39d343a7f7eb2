//! Server-sent event stream of change events.
//!
//! `GET /v1/events?topics=Added,Renamed` registers a subscription for the
//! listed topics and streams every matching event as an SSE `change` event
//! whose data is the JSON `EventResponse`. Omitting `topics` subscribes to
//! all of them. The subscription is removed when the client disconnects.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;

use super::observability::spans;
use super::state::AppState;
use crate::dispatch::Subscription;
use crate::events::Topic;
use crate::Result;

/// SSE event name carrying a change.
pub const CHANGE_EVENT: &str = "change";

/// Interval between keep-alive comments on an idle stream.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Query string of the stream endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Comma-separated topic names.
    pub topics: Option<String>,
}

/// Create the event stream router.
pub fn create_stream_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", get(stream_events))
        .with_state(state)
}

/// Parse the `topics` query value.
///
/// `None` selects every topic; an empty value selects none.
///
/// # Errors
///
/// Returns an error naming the first unknown topic.
pub fn parse_topics(raw: Option<&str>) -> Result<BTreeSet<Topic>> {
    raw.map_or_else(
        || Ok(Topic::ALL.into_iter().collect()),
        |raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::parse)
                .collect()
        },
    )
}

async fn stream_events(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> std::result::Result<
    Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>,
    (StatusCode, String),
> {
    let topics = parse_topics(query.topics.as_deref()).map_err(|e| {
        tracing::debug!(error = %e, "Rejected subscription");
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let subscription = state.registry.subscribe(topics.iter().copied());
    let names: Vec<&str> = topics.iter().map(|t| t.as_str()).collect();
    spans::subscription_span(&subscription.id().to_string(), &names.join(","))
        .in_scope(|| tracing::info!("Event stream opened"));

    Ok(Sse::new(event_stream(subscription))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL).text("ping")))
}

/// Turn a subscription into SSE events. The stream owns the subscription, so
/// dropping it when the client goes away deregisters it.
fn event_stream(
    subscription: Subscription,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    stream::unfold(subscription, |mut subscription| async move {
        loop {
            let response = subscription.recv().await?;
            match Event::default().event(CHANGE_EVENT).json_data(&response) {
                Ok(event) => return Some((Ok(event), subscription)),
                Err(e) => {
                    tracing::warn!(path = %response.filename, error = %e, "Failed to encode event");
                }
            }
        }
    })
}
