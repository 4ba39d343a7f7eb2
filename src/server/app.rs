//! Main application server.
//!
//! Runs the HTTP surface and the poller side by side, with signal handling
//! and graceful shutdown coordination.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::observability::spans;
use super::rest::create_rest_router;
use super::state::AppState;
use super::stream::create_stream_router;
use crate::error::ServerError;
use crate::repository::DiffSource;
use crate::sync::Poller;
use crate::Result;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// How long to wait for the poller to finish its cycle on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Application server.
pub struct App {
    config: ServerConfig,
    state: AppState,
}

impl App {
    /// Create a new application serving `state`.
    #[must_use]
    pub const fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router with all endpoints.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .merge(create_stream_router(self.state.clone()))
            .merge(create_rest_router(self.state.clone()))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &axum::http::Request<_>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");

                        spans::request_span(
                            request.method().as_str(),
                            &request.uri().to_string(),
                            request_id,
                        )
                    })
                    .on_response(
                        |response: &axum::response::Response,
                         latency: Duration,
                         _span: &tracing::Span| {
                            tracing::info!(
                                status = %response.status(),
                                latency = ?latency,
                                "Request completed"
                            );
                        },
                    ),
            )
            .layer(cors)
    }

    /// Run the server and `poller` until SIGTERM or Ctrl+C.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind or encounters a fatal
    /// error while serving.
    pub async fn run<S: DiffSource>(self, poller: Poller<S>) -> Result<()> {
        self.run_until(poller, shutdown_signal()).await
    }

    /// Run the server and `poller` until `shutdown` completes.
    ///
    /// The poller is started only once the listener is bound. On shutdown it
    /// is cancelled and given `shutdown_timeout` to finish its current cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind or encounters a fatal
    /// error while serving.
    pub async fn run_until<S, F>(self, poller: Poller<S>, shutdown: F) -> Result<()>
    where
        S: DiffSource,
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| crate::Error::config(format!("invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed {
                address: addr.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(%addr, "Server listening");

        let cancel = CancellationToken::new();
        let poller_task = tokio::spawn(poller.run(cancel.child_token()));

        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Request(e.to_string()));

        cancel.cancel();
        match tokio::time::timeout(self.config.shutdown_timeout, poller_task).await {
            Ok(Ok(())) => tracing::debug!("Poller finished"),
            Ok(Err(e)) => tracing::error!(error = %e, "Poller task failed"),
            Err(_) => tracing::warn!(
                timeout = ?self.config.shutdown_timeout,
                "Poller did not stop in time"
            ),
        }

        served?;
        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dispatch::SubscriptionRegistry;
    use crate::events::FilterPipeline;
    use crate::repository::memory::MemorySource;
    use crate::sync::{PollerConfig, SyncStatus};

    fn test_state() -> AppState {
        AppState::new(Arc::new(SubscriptionRegistry::default()), SyncStatus::new())
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_app_router_routes() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let app = App::new(ServerConfig::default(), test_state());
        let response = app
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let registry = Arc::new(SubscriptionRegistry::default());
        let poller = Poller::new(
            MemorySource::new(std::env::temp_dir()),
            Arc::clone(&registry),
            FilterPipeline::new(),
            PollerConfig::default(),
        );
        let app = App::new(
            ServerConfig {
                port,
                ..Default::default()
            },
            AppState::new(registry, poller.status()),
        );

        let err = app.run_until(poller, async {}).await.unwrap_err();
        assert!(err.to_string().contains("bind"));
    }

    #[tokio::test]
    async fn test_run_until_stops_poller() {
        let registry = Arc::new(SubscriptionRegistry::default());
        let poller = Poller::new(
            MemorySource::new(std::env::temp_dir()),
            Arc::clone(&registry),
            FilterPipeline::new(),
            PollerConfig::default(),
        );
        let app = App::new(
            ServerConfig {
                port: 0,
                shutdown_timeout: Duration::from_secs(5),
                ..Default::default()
            },
            AppState::new(registry, poller.status()),
        );

        app.run_until(poller, tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();
    }
}
