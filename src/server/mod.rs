//! HTTP surface of git-events.
//!
//! This module provides:
//! - Server-sent event stream of change events
//! - Health and status endpoints
//! - Tracing setup and graceful shutdown

mod app;
mod observability;
mod rest;
mod state;
mod stream;

pub use app::{App, ServerConfig};
pub use observability::{init_tracing, spans, TracingConfig};
pub use rest::{create_rest_router, HealthResponse, StatusResponse};
pub use state::AppState;
pub use stream::{create_stream_router, parse_topics, StreamQuery, CHANGE_EVENT, KEEP_ALIVE_INTERVAL};
