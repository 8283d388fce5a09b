//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect conflicting listeners
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::schema::GatewayConfig;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn check_socket_addr(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::new(field, format!("`{value}` is not a socket address: {e}")));
            None
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let rpc = check_socket_addr(&mut errors, "rpc.bind_address", &config.rpc.bind_address);
    let http = check_socket_addr(&mut errors, "http.bind_address", &config.http.bind_address);
    if let (Some(rpc), Some(http)) = (rpc, http) {
        if rpc == http && rpc.port() != 0 {
            errors.push(ValidationError::new(
                "http.bind_address",
                format!("must differ from rpc.bind_address ({rpc})"),
            ));
        }
    }

    if config.http.max_connections == 0 {
        errors.push(ValidationError::new("http.max_connections", "must be greater than 0"));
    }
    if config.http.max_body_bytes == 0 {
        errors.push(ValidationError::new("http.max_body_bytes", "must be greater than 0"));
    }

    if let Some(address) = &config.backend.address {
        match Url::parse(address) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            Ok(url) => errors.push(ValidationError::new(
                "backend.address",
                format!("`{address}` must be an http(s) URL with a host, got scheme `{}`", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new(
                "backend.address",
                format!("`{address}` is not a URL: {e}"),
            )),
        }
    }
    if config.backend.connect_timeout_ms == 0 {
        errors.push(ValidationError::new("backend.connect_timeout_ms", "must be greater than 0"));
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be greater than 0"));
    }
    if config.timeouts.max_request_ms < config.timeouts.request_ms {
        errors.push(ValidationError::new(
            "timeouts.max_request_ms",
            format!("must be at least timeouts.request_ms ({})", config.timeouts.request_ms),
        ));
    }

    if let Err(e) = EnvFilter::try_new(&config.observability.log_level) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("`{}` is not a valid filter: {e}", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
