//! # HTTP Server
//!
//! Main HTTP server combining the health and service routers.
//!
//! Shutdown is graceful: once the signal resolves, no new connections are
//! accepted and in-flight requests get `shutdown_timeout_secs` to finish.
//! After that the server-wide token is cancelled, which aborts every
//! outstanding store call. Requests that still have not finished after a
//! short grace period are abandoned and reported in the [`DrainOutcome`].

use std::future::{Future, IntoFuture};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::config::HttpServerConfig;
use super::observability_routes::health_routes;
use super::routes::{service_routes, ServiceState};
use crate::observability::{log_event, log_event_with_detail, Event};
use crate::services::Services;

/// How long aborted requests get to write their 502 once the drain times out
const ABORT_GRACE: Duration = Duration::from_secs(1);

/// How the shutdown drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished within the shutdown timeout
    Drained,
    /// The timeout fired and the aborted requests finished within the grace period
    Aborted,
    /// Requests were still running when the server stopped waiting for them
    Abandoned { in_flight: usize },
}

/// HTTP Server for storegate
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
    shutdown: CancellationToken,
    in_flight: Arc<AtomicUsize>,
}

impl HttpServer {
    /// Create a new HTTP server over `services`
    pub fn new(config: HttpServerConfig, services: Services, body_limit: u64) -> Self {
        let shutdown = CancellationToken::new();
        let state = ServiceState::new(services, body_limit)
            .with_request_timeout(config.request_timeout())
            .with_shutdown(shutdown.clone());

        Self::with_state(config, state)
    }

    /// Create a server from prepared state, keeping its shutdown token
    pub fn with_state(config: HttpServerConfig, state: ServiceState) -> Self {
        let shutdown = state.shutdown.clone();
        let in_flight = Arc::clone(&state.in_flight);
        let router = Self::build_router(Arc::new(state));
        Self {
            config,
            router,
            shutdown,
            in_flight,
        }
    }

    /// Build the combined router with all endpoints
    fn build_router(state: Arc<ServiceState>) -> Router {
        Router::new()
            // Health check at root level, outside the validation chain
            .merge(health_routes())
            .merge(service_routes(state))
            .layer(TraceLayer::new_for_http())
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Token whose cancellation aborts every in-flight store call
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Bind the configured address and serve until `signal` resolves
    pub async fn start<S>(self, signal: S) -> std::io::Result<DrainOutcome>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.socket_addr()).await?;
        self.serve(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves and the
    /// drain completes or times out
    pub async fn serve<S>(self, listener: TcpListener, signal: S) -> std::io::Result<DrainOutcome>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let HttpServer {
            config,
            router,
            shutdown,
            in_flight,
        } = self;

        log_event_with_detail(Event::ServerListening, listener.local_addr()?);

        let draining = CancellationToken::new();
        let drain_trigger = draining.clone();
        let graceful = async move {
            signal.await;
            log_event(Event::ShutdownStart);
            drain_trigger.cancel();
        };

        let server = axum::serve(listener, router)
            .with_graceful_shutdown(graceful)
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => return result.map(|()| DrainOutcome::Drained),
            _ = draining.cancelled() => {}
        }

        match tokio::time::timeout(config.shutdown_timeout(), &mut server).await {
            Ok(result) => {
                info!("In-flight requests drained");
                result.map(|()| DrainOutcome::Drained)
            }
            Err(_) => {
                log_event_with_detail(Event::DrainTimeout, config.shutdown_timeout_secs);
                shutdown.cancel();
                match tokio::time::timeout(ABORT_GRACE, &mut server).await {
                    Ok(result) => result.map(|()| DrainOutcome::Aborted),
                    Err(_) => {
                        let in_flight = in_flight.load(Ordering::SeqCst);
                        log_event_with_detail(Event::DrainAbandoned, in_flight);
                        Ok(DrainOutcome::Abandoned { in_flight })
                    }
                }
            }
        }
    }
}
