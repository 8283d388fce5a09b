//! Process coordinator.
//!
//! # Responsibilities
//! - Bind both listeners, failing fast on conflicts
//! - Build the routing table and the backend channel
//! - Spawn the RPC server and the gateway as independent tasks
//! - Drain both on shutdown within one grace period
//!
//! # Design Decisions
//! - The gateway stops first: its in-flight exchanges still need the RPC
//!   server to answer
//! - A task still running at the deadline is aborted, which closes its
//!   connections without a response
//! - An unexpected task exit shuts the other one down and is reported as
//!   an error

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::backend::{BackendError, GrpcBackend};
use crate::config::GatewayConfig;
use crate::contract::example::EXAMPLE_SERVICE;
use crate::http::{Gateway, GatewayState, HttpServer};
use crate::lifecycle::shutdown::{drain_until, Shutdown, ShutdownReport};
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::routing::{RouteError, RoutingTable};
use crate::rpc::{ExampleHandler, RpcServer, RpcService};

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("invalid routing table: {0}")]
    Route(#[from] RouteError),
    #[error("backend setup failed: {0}")]
    Backend(#[from] BackendError),
    #[error("{server} server exited unexpectedly: {reason}")]
    ServerExited { server: &'static str, reason: String },
}

/// Starts the RPC server and its gateway from one configuration.
pub struct Coordinator {
    config: GatewayConfig,
}

impl Coordinator {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config }
    }

    /// Bind, build and spawn both servers around `handler`.
    pub async fn start<H: ExampleHandler>(self, handler: H) -> Result<RunningServers, LifecycleError> {
        let config = self.config;

        let rpc_listener =
            Listener::bind(&config.rpc.bind_address, config.http.max_connections).await?;
        let http_listener =
            Listener::bind(&config.http.bind_address, config.http.max_connections).await?;
        let rpc_addr = rpc_listener.local_addr();
        let http_addr = http_listener.local_addr();

        let backend_address = config
            .backend
            .address
            .clone()
            .unwrap_or_else(|| loopback_url(rpc_addr));
        let channel = GrpcBackend::lazy_channel(&backend_address, config.backend.connect_timeout())?;
        let backend = GrpcBackend::example(channel)?;
        let routes = RoutingTable::build(&EXAMPLE_SERVICE)?;

        tracing::info!(
            rpc_address = %rpc_addr,
            http_address = %http_addr,
            backend = %backend_address,
            routes = routes.len(),
            "Servers bound"
        );

        let gateway = Gateway::new(GatewayState {
            routes,
            backend: Arc::new(backend),
            default_timeout: config.timeouts.request(),
            max_timeout: config.timeouts.max_request(),
            max_body_bytes: config.http.max_body_bytes,
        });
        let http_server = HttpServer::new(gateway);
        let connections = http_server.connections();

        let rpc_stop = Shutdown::new();
        let http_stop = Shutdown::new();

        let rpc_server = RpcServer::new(RpcService::new(handler));
        let rpc_signal = rpc_stop.wait();
        let rpc_task = tokio::spawn(async move {
            rpc_server
                .run(rpc_listener.into_inner(), rpc_signal)
                .await
                .map_err(|e| e.to_string())
        });

        let http_signal = http_stop.wait();
        let http_task = tokio::spawn(async move {
            http_server.run(http_listener, http_signal).await;
            Ok(())
        });

        Ok(RunningServers {
            rpc_addr,
            http_addr,
            grace_period: config.shutdown.grace_period(),
            connections,
            rpc_stop,
            http_stop,
            rpc_task: Some(rpc_task),
            http_task: Some(http_task),
        })
    }
}

type ServerTask = JoinHandle<Result<(), String>>;

/// Handle to both running servers.
pub struct RunningServers {
    rpc_addr: SocketAddr,
    http_addr: SocketAddr,
    grace_period: Duration,
    connections: ConnectionTracker,
    rpc_stop: Shutdown,
    http_stop: Shutdown,
    rpc_task: Option<ServerTask>,
    http_task: Option<ServerTask>,
}

impl RunningServers {
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Live HTTP connection count.
    pub fn connections(&self) -> &ConnectionTracker {
        &self.connections
    }

    /// Run until `signal` resolves or a server exits on its own, then shut down.
    pub async fn run_until(
        mut self,
        signal: impl std::future::Future<Output = ()>,
    ) -> Result<ShutdownReport, LifecycleError> {
        let (Some(mut rpc_task), Some(mut http_task)) = (self.rpc_task.take(), self.http_task.take())
        else {
            return Ok(self.shutdown().await);
        };

        let exited = tokio::select! {
            _ = signal => None,
            result = &mut rpc_task => Some(("rpc", result)),
            result = &mut http_task => Some(("http", result)),
        };

        let Some((server, result)) = exited else {
            tracing::info!("Shutdown requested");
            self.rpc_task = Some(rpc_task);
            self.http_task = Some(http_task);
            return Ok(self.shutdown().await);
        };

        let reason = match result {
            Ok(Ok(())) => "stopped without a shutdown signal".to_string(),
            Ok(Err(e)) => e,
            Err(e) => e.to_string(),
        };
        tracing::error!(server, reason = %reason, "Server exited unexpectedly");
        if server == "rpc" {
            self.http_task = Some(http_task);
        } else {
            self.rpc_task = Some(rpc_task);
        }
        self.shutdown().await;
        Err(LifecycleError::ServerExited { server, reason })
    }

    /// Drain the gateway, then the RPC server, aborting whatever is still
    /// running when the grace period runs out.
    pub async fn shutdown(mut self) -> ShutdownReport {
        let started = Instant::now();
        let deadline = started + self.grace_period;
        tracing::info!(
            grace_period_ms = self.grace_period.as_millis() as u64,
            active_connections = self.connections.active_count(),
            "Shutting down"
        );

        self.http_stop.trigger();
        let http = drain_until(self.http_task.take(), deadline).await;
        self.rpc_stop.trigger();
        let rpc = drain_until(self.rpc_task.take(), deadline).await;

        let report = ShutdownReport {
            http,
            rpc,
            elapsed: started.elapsed(),
        };
        if report.graceful() {
            tracing::info!(elapsed_ms = report.elapsed.as_millis() as u64, "Shutdown complete");
        } else {
            tracing::warn!(
                http = ?report.http,
                rpc = ?report.rpc,
                "Grace period expired, in-flight work aborted"
            );
        }
        report
    }
}

impl Drop for RunningServers {
    fn drop(&mut self) {
        for task in [self.http_task.take(), self.rpc_task.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

/// `http://` URL for reaching `addr` from this host.
fn loopback_url(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}
