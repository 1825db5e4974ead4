//! Service HTTP Routes
//!
//! Every route runs the same sequence:
//! validation chain, bounded body read, decode, operation, encode.
//! The first failure becomes the only response written.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::api::body::declared_length;
use crate::api::{
    decode, encode, read_bounded, AddUserRequest, ApiResult, IncrementRequest, SignRequest,
};
use crate::core::{RequestContext, ValidationChain};
use crate::services::{OperationResult, Services};

pub const INCR_ROUTE: &str = "/redis/incr";
pub const SIGN_ROUTE: &str = "/sign/hmacsha512";
pub const USERS_ROUTE: &str = "/postgres/users";

// ==================
// Shared State
// ==================

/// State shared across service handlers
pub struct ServiceState {
    pub services: Services,
    pub chain: ValidationChain,
    pub body_limit: u64,
    pub request_timeout: Option<Duration>,
    /// Parent of every request's cancellation token
    pub shutdown: CancellationToken,
    /// Requests currently inside a handler
    pub in_flight: Arc<AtomicUsize>,
}

impl ServiceState {
    /// POST-only chain, no request deadline
    pub fn new(services: Services, body_limit: u64) -> Self {
        Self {
            services,
            chain: ValidationChain::for_method(axum::http::Method::POST),
            body_limit,
            request_timeout: None,
            shutdown: CancellationToken::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_chain(mut self, chain: ValidationChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Number of requests still being handled
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Fresh context for one request
    fn context(&self) -> RequestContext {
        let ctx = RequestContext::new(self.shutdown.child_token());
        match self.request_timeout {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx,
        }
    }
}

/// Create the service routes. Any method is routed so the chain can answer 405.
pub fn service_routes(state: Arc<ServiceState>) -> Router {
    Router::new()
        .route(INCR_ROUTE, any(incr_handler))
        .route(SIGN_ROUTE, any(sign_handler))
        .route(USERS_ROUTE, any(add_user_handler))
        .with_state(state)
}

// ==================
// Handlers
// ==================

async fn incr_handler(State(state): State<Arc<ServiceState>>, request: Request) -> Response {
    let counter = state.services.counter.clone();
    serve_route(
        &state,
        INCR_ROUTE,
        request,
        |ctx, req: Option<IncrementRequest>| async move { counter.inc(&ctx, req).await },
    )
    .await
}

async fn sign_handler(State(state): State<Arc<ServiceState>>, request: Request) -> Response {
    let signer = state.services.signer;
    serve_route(
        &state,
        SIGN_ROUTE,
        request,
        |_ctx, req: Option<SignRequest>| async move { signer.sign(req) },
    )
    .await
}

async fn add_user_handler(State(state): State<Arc<ServiceState>>, request: Request) -> Response {
    let users = state.services.users.clone();
    serve_route(
        &state,
        USERS_ROUTE,
        request,
        |ctx, req: Option<AddUserRequest>| async move { users.add_user(&ctx, req).await },
    )
    .await
}

/// Run one request through the route sequence inside its own span
async fn serve_route<Req, Res, F, Fut>(
    state: &ServiceState,
    route: &'static str,
    request: Request,
    operation: F,
) -> Response
where
    Req: DeserializeOwned,
    Res: Serialize,
    F: FnOnce(RequestContext, Option<Req>) -> Fut,
    Fut: Future<Output = OperationResult<Res>>,
{
    let _in_flight = InFlight::enter(&state.in_flight);
    let ctx = state.context();
    let span = info_span!("request", route, request_id = %ctx.request_id);

    async move {
        info!(method = %request.method(), "Request received");
        let started = ctx.clone();

        let response = match process(state, request, ctx, operation).await {
            Ok(body) => json_response(body),
            Err(err) => {
                error!(category = err.category(), error = %err, "Request failed");
                err.into_response()
            }
        };

        info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed_ms() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}

async fn process<Req, Res, F, Fut>(
    state: &ServiceState,
    request: Request,
    ctx: RequestContext,
    operation: F,
) -> ApiResult<Vec<u8>>
where
    Req: DeserializeOwned,
    Res: Serialize,
    F: FnOnce(RequestContext, Option<Req>) -> Fut,
    Fut: Future<Output = OperationResult<Res>>,
{
    let (parts, body) = request.into_parts();
    // Always `Some` here; the nil guard only fires for callers without a request head
    state.chain.run(Some(&parts))?;

    let bytes = read_bounded(
        body.into_data_stream(),
        declared_length(&parts.headers),
        state.body_limit,
    )
    .await?;

    let decoded: Req = decode(&bytes)?;
    debug!(bytes = bytes.len(), "Request decoded");

    // A decoded body is always a present request; `None` is for direct callers
    let result = operation(ctx, Some(decoded)).await?;
    Ok(encode(&result)?)
}

/// Counts one request as in flight until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn json_response(body: Vec<u8>) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}
