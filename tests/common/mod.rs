//! Shared utilities for end-to-end tests: start the full stack on ephemeral
//! loopback ports with a scripted handler.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tonic::metadata::MetadataMap;

use rpc_gateway::config::GatewayConfig;
use rpc_gateway::contract::example::{ExampleRequest, ExampleResponse};
use rpc_gateway::lifecycle::{Coordinator, RunningServers};
use rpc_gateway::rpc::{CallContext, ExampleHandler, RpcStatus, StatusOutcome};

/// What the handler observed.
#[derive(Default)]
pub struct CallLog {
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
    /// Calls whose future was dropped before finishing.
    pub abandoned: AtomicUsize,
    pub metadata: Mutex<Vec<MetadataMap>>,
}

impl CallLog {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub fn last_metadata(&self, key: &str) -> Option<String> {
        let seen = self.metadata.lock().unwrap();
        seen.last()
            .and_then(|md| md.get(key))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// Counts a call as abandoned unless it reached `finish`.
struct Completion {
    log: Arc<CallLog>,
    done: bool,
}

impl Completion {
    fn finish(mut self) {
        self.done = true;
        self.log.completed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.done {
            self.log.abandoned.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Greeting handler with knobs.
///
/// `SayGoodbye` scripts failures by name: `nobody` is NotFound, `mallory`
/// is PermissionDenied and `panic` panics.
#[derive(Clone, Default)]
pub struct ScriptedHandler {
    pub delay: Option<Duration>,
    pub log: Arc<CallLog>,
}

impl ScriptedHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    async fn observe(&self, ctx: &CallContext) {
        self.log.calls.fetch_add(1, Ordering::SeqCst);
        self.log
            .metadata
            .lock()
            .unwrap()
            .push(ctx.metadata_map().clone());

        let completion = Completion {
            log: self.log.clone(),
            done: false,
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        completion.finish();
    }
}

#[async_trait]
impl ExampleHandler for ScriptedHandler {
    async fn say_hello(&self, ctx: &CallContext, request: ExampleRequest) -> StatusOutcome<ExampleResponse> {
        self.observe(ctx).await;
        Ok(ExampleResponse {
            message: format!("Hello, {}!", request.name),
        })
    }

    async fn say_goodbye(&self, ctx: &CallContext, request: ExampleRequest) -> StatusOutcome<ExampleResponse> {
        self.observe(ctx).await;
        match request.name.as_str() {
            "nobody" => Err(RpcStatus::not_found("no such person")),
            "mallory" => Err(RpcStatus::new(tonic::Code::PermissionDenied, "go away")),
            "panic" => panic!("scripted panic"),
            name => Ok(ExampleResponse {
                message: format!("Goodbye, {}!", name),
            }),
        }
    }
}

/// Defaults with both listeners on `127.0.0.1:0`.
pub fn ephemeral_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.rpc.bind_address = "127.0.0.1:0".into();
    config.http.bind_address = "127.0.0.1:0".into();
    config.shutdown.grace_period_ms = 2_000;
    config.timeouts.request_ms = 5_000;
    config.observability.log_level = "rpc_gateway=debug".into();
    config
}

pub async fn start(handler: ScriptedHandler) -> RunningServers {
    start_with(ephemeral_config(), handler).await
}

pub async fn start_with(config: GatewayConfig, handler: ScriptedHandler) -> RunningServers {
    rpc_gateway::observability::logging::init(&config.observability.log_level);
    Coordinator::new(config)
        .start(handler)
        .await
        .expect("stack failed to start")
}

pub fn url(servers: &RunningServers, path: &str) -> String {
    format!("http://{}{}", servers.http_addr(), path)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// URL of a loopback port with nothing listening on it.
pub fn dead_backend_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
