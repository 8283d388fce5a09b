//! gRPC service with a REST/JSON gateway.

pub mod backend;
pub mod config;
pub mod contract;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod rpc;
pub mod translate;

pub use config::schema::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Coordinator, Shutdown};
