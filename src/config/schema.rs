//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the RPC server and its gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// gRPC listener.
    pub rpc: RpcConfig,

    /// REST/JSON listener.
    pub http: HttpConfig,

    /// Where the gateway sends its RPC calls.
    pub backend: BackendConfig,

    /// Request deadline configuration.
    pub timeouts: TimeoutConfig,

    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RpcConfig {
    /// Bind address (e.g., "0.0.0.0:50051").
    pub bind_address: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:50051".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Largest accepted request body; bigger bodies get 413.
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            max_connections: 10_000,
            max_body_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// RPC server URL, e.g. `http://127.0.0.1:50051`.
    /// `None` means the local RPC listener on loopback.
    pub address: Option<String>,

    /// TCP connect timeout for the backend channel.
    pub connect_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: None,
            connect_timeout_ms: 1_000,
        }
    }
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for requests that carry no `Grpc-Timeout`.
    pub request_ms: u64,

    /// Upper bound for client-requested deadlines.
    pub max_request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: 30_000,
            max_request_ms: 300_000,
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn max_request(&self) -> Duration {
        Duration::from_millis(self.max_request_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight requests may run after a termination signal.
    pub grace_period_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 10_000,
        }
    }
}

impl ShutdownConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter (e.g. `info`, `rpc_gateway=debug`); `RUST_LOG` overrides it.
    pub log_level: String,

    /// Serve Prometheus metrics.
    pub metrics_enabled: bool,

    /// Prometheus scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(config.rpc.bind_address, "0.0.0.0:50051");
        assert_eq!(config.http.bind_address, "0.0.0.0:8081");
        assert_eq!(config.backend.address, None);
        assert_eq!(config.timeouts.request(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [http]
            bind_address = "127.0.0.1:9000"

            [backend]
            address = "http://10.0.0.5:50051"
            "#,
        )
        .unwrap();
        assert_eq!(config.http.bind_address, "127.0.0.1:9000");
        assert_eq!(config.http.max_body_bytes, 1024 * 1024);
        assert_eq!(config.backend.address.as_deref(), Some("http://10.0.0.5:50051"));
        assert_eq!(config.backend.connect_timeout_ms, 1_000);
    }
}
