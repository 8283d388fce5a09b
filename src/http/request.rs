//! Request handling and transformation.
//!
//! # Responsibilities
//! - Capture an inbound HTTP request as an [`HttpExchange`]
//! - Derive the call deadline from `Grpc-Timeout` and configured limits
//! - Build outbound RPC metadata from request headers
//!
//! # Design Decisions
//! - Header forwarding follows grpc-gateway: `Grpc-Metadata-<k>` becomes
//!   `<k>`, permanent HTTP headers become `grpcgateway-<name>`
//! - Request ID is forwarded unchanged so both servers log the same ID
//! - Binary (`-bin`) and invalid metadata entries are skipped, never fatal

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, Method};
use bytes::Bytes;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, MetadataMap};

use crate::resilience::timeouts::{
    effective_timeout, parse_grpc_timeout, TimeoutError, GRPC_TIMEOUT_HEADER,
};

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Prefix of headers passed through as RPC metadata (both directions).
pub const GRPC_METADATA_PREFIX: &str = "grpc-metadata-";
/// Prefix given to permanent HTTP headers forwarded as metadata.
pub const GATEWAY_METADATA_PREFIX: &str = "grpcgateway-";

/// Standard HTTP headers that are forwarded under [`GATEWAY_METADATA_PREFIX`].
const PERMANENT_HEADERS: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-language",
    "accept-ranges",
    "authorization",
    "cache-control",
    "content-type",
    "cookie",
    "date",
    "expect",
    "from",
    "host",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-schedule-tag-match",
    "if-unmodified-since",
    "max-forwards",
    "origin",
    "pragma",
    "referer",
    "user-agent",
    "via",
    "warning",
];

/// One inbound HTTP request, fully buffered.
#[derive(Debug, Clone)]
pub struct HttpExchange {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub peer: Option<SocketAddr>,
    /// When the request head arrived; the deadline counts from here.
    pub received: Instant,
}

impl HttpExchange {
    pub fn request_id(&self) -> Option<&str> {
        self.header(X_REQUEST_ID)
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Deadline for the exchange: `Grpc-Timeout` capped by `max`, else `default`.
    pub fn timeout(&self, default: Duration, max: Duration) -> Result<Duration, TimeoutError> {
        request_timeout(&self.headers, default, max)
    }

    /// Metadata for the outbound call.
    pub fn outbound_metadata(&self) -> MetadataMap {
        let mut metadata = MetadataMap::new();

        for (name, value) in &self.headers {
            let name = name.as_str();
            let Ok(value) = value.to_str() else {
                continue;
            };

            if let Some(key) = name.strip_prefix(GRPC_METADATA_PREFIX) {
                append(&mut metadata, key, value);
            } else if PERMANENT_HEADERS.contains(&name) {
                append(&mut metadata, &format!("{GATEWAY_METADATA_PREFIX}{name}"), value);
                if name == header::AUTHORIZATION.as_str() {
                    append(&mut metadata, name, value);
                }
            } else if name == X_REQUEST_ID {
                append(&mut metadata, name, value);
            }
        }

        if let Some(host) = self.header(header::HOST.as_str()) {
            append(&mut metadata, X_FORWARDED_HOST, host);
        }
        if let Some(peer) = self.peer {
            let forwarded = match self.header(X_FORWARDED_FOR) {
                Some(existing) => format!("{existing}, {}", peer.ip()),
                None => peer.ip().to_string(),
            };
            append(&mut metadata, X_FORWARDED_FOR, &forwarded);
        }

        metadata
    }
}

/// Deadline derived from request headers alone, usable before the body is read.
pub fn request_timeout(
    headers: &HeaderMap,
    default: Duration,
    max: Duration,
) -> Result<Duration, TimeoutError> {
    let requested = match headers.get(GRPC_TIMEOUT_HEADER) {
        Some(value) => {
            let raw = value.to_str().map_err(|_| {
                TimeoutError::Malformed(String::from_utf8_lossy(value.as_bytes()).into_owned())
            })?;
            Some(parse_grpc_timeout(raw)?)
        }
        None => None,
    };
    Ok(effective_timeout(requested, default, max))
}

fn append(metadata: &mut MetadataMap, key: &str, value: &str) {
    if key.ends_with("-bin") || key == GRPC_TIMEOUT_HEADER {
        tracing::trace!(key, "Skipping metadata entry");
        return;
    }
    let (Ok(key), Ok(value)) = (
        AsciiMetadataKey::from_bytes(key.to_ascii_lowercase().as_bytes()),
        AsciiMetadataValue::try_from(value),
    ) else {
        tracing::trace!(key, "Skipping invalid metadata entry");
        return;
    };
    metadata.append(key, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn exchange(headers: &[(&'static str, &'static str)]) -> HttpExchange {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.append(*name, HeaderValue::from_static(value));
        }
        HttpExchange {
            method: Method::GET,
            path: "/v1/greet/Ada".into(),
            query: None,
            headers: map,
            body: Bytes::new(),
            peer: Some("10.0.0.7:40000".parse().unwrap()),
            received: Instant::now(),
        }
    }

    #[test]
    fn test_grpc_metadata_prefix_is_stripped() {
        let md = exchange(&[("grpc-metadata-tenant", "acme")]).outbound_metadata();
        assert_eq!(md.get("tenant").unwrap(), "acme");
        assert!(md.get("grpc-metadata-tenant").is_none());
    }

    #[test]
    fn test_permanent_headers_are_prefixed() {
        let md = exchange(&[
            ("authorization", "Bearer t0ken"),
            ("user-agent", "curl/8"),
            ("x-custom", "dropped"),
        ])
        .outbound_metadata();
        assert_eq!(md.get("grpcgateway-authorization").unwrap(), "Bearer t0ken");
        assert_eq!(md.get("authorization").unwrap(), "Bearer t0ken");
        assert_eq!(md.get("grpcgateway-user-agent").unwrap(), "curl/8");
        assert!(md.get("x-custom").is_none());
    }

    #[test]
    fn test_forwarded_headers() {
        let md = exchange(&[
            ("host", "api.example.com"),
            ("x-forwarded-for", "203.0.113.9"),
            ("x-request-id", "req-1"),
        ])
        .outbound_metadata();
        assert_eq!(md.get("x-forwarded-host").unwrap(), "api.example.com");
        assert_eq!(md.get("x-forwarded-for").unwrap(), "203.0.113.9, 10.0.0.7");
        assert_eq!(md.get("x-request-id").unwrap(), "req-1");
    }

    #[test]
    fn test_binary_and_timeout_metadata_skipped() {
        let md = exchange(&[
            ("grpc-metadata-trace-bin", "AAEC"),
            ("grpc-metadata-grpc-timeout", "1S"),
        ])
        .outbound_metadata();
        assert!(md.get("grpc-timeout").is_none());
        assert_eq!(md.keys().count(), 1); // x-forwarded-for only
    }

    #[test]
    fn test_timeout_from_header() {
        let default = Duration::from_secs(30);
        let max = Duration::from_secs(60);

        let none = exchange(&[]);
        assert_eq!(none.timeout(default, max).unwrap(), default);

        let short = exchange(&[("grpc-timeout", "100m")]);
        assert_eq!(short.timeout(default, max).unwrap(), Duration::from_millis(100));

        let long = exchange(&[("grpc-timeout", "5H")]);
        assert_eq!(long.timeout(default, max).unwrap(), max);

        let bad = exchange(&[("grpc-timeout", "soon")]);
        assert!(bad.timeout(default, max).is_err());
    }
}
