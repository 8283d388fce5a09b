//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with the gateway handler
//! - Wire up middleware (request ID, tracing, panic recovery)
//! - Run the accept loop and serve each connection (HTTP/1.1 and HTTP/2)
//! - Dispatch requests: route → translate → RPC call → response
//! - Drain connections on shutdown
//!
//! # Design Decisions
//! - Connection tasks live in a `JoinSet` owned by the server future, so
//!   dropping the server aborts every in-flight exchange
//! - The RPC call runs under the request deadline; expiry drops the call,
//!   which cancels it on the RPC server
//! - State is built once and shared immutably through an `Arc`

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::Router;
use http_body_util::LengthLimitError;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tonic::Code;

use crate::backend::{BackendError, OutboundCall, RpcBackend};
use crate::http::request::{request_timeout, HttpExchange};
use crate::http::response::{self, GatewayError};
use crate::net::{ConnectionGuard, ConnectionTracker, Listener};
use crate::observability::metrics;
use crate::routing::{RouteMatch, RoutingTable};
use crate::translate::{decode_request, encode_response};

/// Immutable state shared by every request.
pub struct GatewayState {
    pub routes: RoutingTable,
    pub backend: Arc<dyn RpcBackend>,
    /// Deadline applied when the client sends no `Grpc-Timeout`.
    pub default_timeout: Duration,
    /// Upper bound for client-requested deadlines.
    pub max_timeout: Duration,
    pub max_body_bytes: usize,
}

/// The REST/JSON front door of the RPC service.
#[derive(Clone)]
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    pub fn new(state: GatewayState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Serve one buffered exchange. Never fails: errors become envelopes.
    pub async fn handle(&self, exchange: HttpExchange) -> Response {
        let start = Instant::now();
        let request_id = exchange.request_id().unwrap_or("unknown").to_string();

        tracing::debug!(
            request_id = %request_id,
            method = %exchange.method,
            path = %exchange.path,
            "Gateway request"
        );

        let route = match self.state.routes.resolve(&exchange.method, &exchange.path) {
            Ok(route) => route,
            Err(not_found) => {
                tracing::warn!(request_id = %request_id, path = %exchange.path, "No route matched");
                metrics::record_request("none", 404, start);
                return GatewayError::from(not_found).into_response();
            }
        };

        let rpc_method = route.binding.rpc_name();
        let response = match self.dispatch(&exchange, route).await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::warn!(request_id = %request_id, rpc_method, error = %err, "Request failed");
                } else {
                    tracing::debug!(request_id = %request_id, rpc_method, error = %err, "Request rejected");
                }
                err.into_response()
            }
        };

        tracing::info!(
            request_id = %request_id,
            rpc_method,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        metrics::record_request(rpc_method, response.status().as_u16(), start);
        response
    }

    async fn dispatch(
        &self,
        exchange: &HttpExchange,
        route: RouteMatch<'_>,
    ) -> Result<Response, GatewayError> {
        let binding = route.binding;
        let timeout = exchange.timeout(self.state.default_timeout, self.state.max_timeout)?;
        let payload = decode_request(binding, &route.params, exchange.query.as_deref(), &exchange.body)?;

        // Time spent reading the body counts against the deadline.
        let budget = timeout.saturating_sub(exchange.received.elapsed());
        if budget.is_zero() {
            return Err(GatewayError::DeadlineExceeded(timeout));
        }

        let call = OutboundCall {
            payload,
            metadata: exchange.outbound_metadata(),
            timeout: budget,
        };
        let started = Instant::now();
        let reply = match tokio::time::timeout(budget, self.state.backend.call(binding.rpc_method, call)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => return Err(deadline_aware(err, started.elapsed(), budget, timeout)),
            Err(_) => return Err(GatewayError::DeadlineExceeded(timeout)),
        };

        let body = encode_response(binding.rpc_method.response, &reply.payload);
        Ok(response::success(binding.success_status, body, &reply.metadata))
    }

    /// Axum router serving every path through the gateway.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(self.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(CatchPanicLayer::custom(panic_response))
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }
}

/// A cancellation, deadline or transport failure observed once the budget
/// is spent is our own timeout, whichever side noticed it first.
fn deadline_aware(
    err: BackendError,
    elapsed: Duration,
    budget: Duration,
    timeout: Duration,
) -> GatewayError {
    let cut_short = match &err {
        BackendError::Status(status) => {
            matches!(status.code, Code::Cancelled | Code::DeadlineExceeded)
        }
        BackendError::Unavailable(_) => true,
        BackendError::UnknownMethod(_) | BackendError::Conversion(_) => false,
    };
    if cut_short && elapsed >= budget {
        GatewayError::DeadlineExceeded(timeout)
    } else {
        err.into()
    }
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %detail, "Request handler panicked");
    GatewayError::Internal(detail).into_response()
}

fn is_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

async fn gateway_handler(State(gateway): State<Gateway>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let received = Instant::now();
    let (parts, body) = request.into_parts();

    let state = gateway.state();
    let timeout = match request_timeout(&parts.headers, state.default_timeout, state.max_timeout) {
        Ok(timeout) => timeout,
        Err(err) => return GatewayError::from(err).into_response(),
    };

    let limit = state.max_body_bytes;
    let body = match tokio::time::timeout(timeout, axum::body::to_bytes(body, limit)).await {
        Ok(Ok(body)) => body,
        Err(_) => {
            tracing::warn!(path = %parts.uri.path(), "Request body not received before the deadline");
            return GatewayError::DeadlineExceeded(timeout).into_response();
        }
        Ok(Err(err)) => {
            let err = err.into_inner();
            let failure = if is_length_limit(&*err) {
                GatewayError::PayloadTooLarge { limit }
            } else {
                GatewayError::BodyRead(err.to_string())
            };
            return failure.into_response();
        }
    };

    let exchange = HttpExchange {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
        peer,
        received,
    };
    gateway.handle(exchange).await
}

/// HTTP server for the gateway.
pub struct HttpServer {
    gateway: Gateway,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn connections(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Accept connections until `shutdown` resolves, then drain them.
    ///
    /// Dropping the returned future aborts every open connection.
    pub async fn run(self, listener: Listener, shutdown: impl Future<Output = ()> + Send) {
        tracing::info!(address = %listener.local_addr(), "HTTP server starting");

        let router = self.gateway.router();
        let (drain_tx, drain_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let guard = self.tracker.track();
                        let router = router.clone();
                        let drain = drain_rx.clone();
                        connections.spawn(async move {
                            serve_connection(stream, peer, router, drain, guard).await;
                            drop(permit);
                        });
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        tracing::info!(
            active_connections = self.tracker.active_count(),
            "HTTP server draining"
        );
        let _ = drain_tx.send(true);
        while connections.join_next().await.is_some() {}

        tracing::info!("HTTP server stopped");
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    mut drain: watch::Receiver<bool>,
    guard: ConnectionGuard,
) {
    let service = router.map_request(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection =
        builder.serve_connection_with_upgrades(TokioIo::new(stream), TowerToHyperService::new(service));
    tokio::pin!(connection);

    let mut draining = false;
    loop {
        tokio::select! {
            result = connection.as_mut() => {
                if let Err(err) = result {
                    tracing::debug!(connection_id = %guard.id(), error = %err, "Connection error");
                }
                break;
            }
            _ = drain.changed(), if !draining => {
                draining = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}
