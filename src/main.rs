//! RPC Gateway (v1)
//!
//! Runs the `example.v1.ExampleService` gRPC server and a REST/JSON gateway
//! in front of it, in one process.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                   RPC GATEWAY                     │
//!                        │                                                   │
//!     REST/JSON request  │  ┌─────────┐   ┌─────────┐   ┌───────────┐        │
//!     ───────────────────┼─▶│   net   │──▶│  http   │──▶│  routing  │        │
//!                        │  │listener │   │ server  │   │   table   │        │
//!                        │  └─────────┘   └─────────┘   └─────┬─────┘        │
//!                        │                                    ▼              │
//!                        │                              ┌───────────┐        │
//!                        │                              │ translate │        │
//!                        │                              └─────┬─────┘        │
//!                        │                                    ▼              │
//!     JSON response      │  ┌─────────┐                 ┌───────────┐        │
//!     ◀──────────────────┼──│response │◀────────────────│  backend  │──┐     │
//!                        │  └─────────┘                 └───────────┘  │     │
//!                        │                                              │gRPC │
//!     gRPC call          │  ┌─────────┐   ┌─────────┐                   │     │
//!     ───────────────────┼─▶│   rpc   │──▶│ handler │◀──────────────────┘     │
//!                        │  │ server  │   │         │                         │
//!                        │  └─────────┘   └─────────┘                         │
//!                        │                                                   │
//!                        │  config · lifecycle · observability · resilience  │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use rpc_gateway::config::{self, GatewayConfig};
use rpc_gateway::lifecycle::{shutdown_signal, Coordinator};
use rpc_gateway::observability::{logging, metrics};
use rpc_gateway::rpc::GreetingHandler;

#[derive(Parser)]
#[command(name = "rpc-gateway")]
#[command(about = "gRPC service with a REST/JSON gateway", long_about = None)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `rpc.bind_address`.
    #[arg(long)]
    rpc_addr: Option<String>,

    /// Override `http.bind_address`.
    #[arg(long)]
    http_addr: Option<String>,

    /// Override `backend.address`.
    #[arg(long)]
    backend: Option<String>,
}

fn load(args: &Args) -> Result<GatewayConfig, config::ConfigError> {
    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(addr) = &args.rpc_addr {
        config.rpc.bind_address = addr.clone();
    }
    if let Some(addr) = &args.http_addr {
        config.http.bind_address = addr.clone();
    }
    if let Some(backend) = &args.backend {
        config.backend.address = Some(backend.clone());
    }
    config::validated(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load(&args) {
        Ok(config) => config,
        Err(e) => {
            logging::init(logging::DEFAULT_FILTER);
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        rpc_address = %config.rpc.bind_address,
        http_address = %config.http.bind_address,
        request_timeout_ms = config.timeouts.request_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let servers = match Coordinator::new(config).start(GreetingHandler::new()).await {
        Ok(servers) => servers,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    match servers.run_until(shutdown_signal()).await {
        Ok(report) => {
            tracing::info!(graceful = report.graceful(), "Exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failure");
            ExitCode::FAILURE
        }
    }
}
