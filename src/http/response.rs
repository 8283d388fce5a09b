//! Response handling and transformation.
//!
//! # Responsibilities
//! - Define [`GatewayError`], the closed set of gateway failures
//! - Render every failure as the JSON error envelope
//! - Return RPC response metadata as `Grpc-Metadata-*` headers
//!
//! # Design Decisions
//! - Gateway-originated failures use gateway codes (`RouteNotFound`,
//!   `BadRequest`, ...); RPC failures keep their gRPC code name
//! - Internal failures never expose their cause to the client

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tonic::metadata::MetadataMap;

use crate::backend::BackendError;
use crate::http::request::GRPC_METADATA_PREFIX;
use crate::resilience::timeouts::TimeoutError;
use crate::routing::RouteNotFound;
use crate::rpc::RpcStatus;
use crate::translate::{encode_failure, ErrorEnvelope, TranslateError};

/// Response metadata that never becomes a `Grpc-Metadata-*` header.
const RESERVED_METADATA: &[&str] = &[
    "content-type",
    "content-length",
    "date",
    "te",
    "trailer",
    "transfer-encoding",
    "user-agent",
    "grpc-status",
    "grpc-message",
    "grpc-encoding",
    "grpc-accept-encoding",
    "grpc-timeout",
];

/// Everything that can go wrong while serving one REST request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    RouteNotFound(#[from] RouteNotFound),
    #[error(transparent)]
    BadRequest(#[from] TranslateError),
    #[error("invalid Grpc-Timeout header: {0}")]
    InvalidTimeout(#[from] TimeoutError),
    #[error("failed to read request body: {0}")]
    BodyRead(String),
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("deadline of {}ms exceeded", .0.as_millis())]
    DeadlineExceeded(Duration),
    /// Failure status returned by the RPC server.
    #[error(transparent)]
    Rpc(RpcStatus),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BackendError> for GatewayError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status(status) => GatewayError::Rpc(status),
            BackendError::Unavailable(reason) => GatewayError::BackendUnavailable(reason),
            other @ (BackendError::UnknownMethod(_) | BackendError::Conversion(_)) => {
                GatewayError::Internal(other.to_string())
            }
        }
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BadRequest(_)
            | GatewayError::InvalidTimeout(_)
            | GatewayError::BodyRead(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Rpc(status) => encode_failure(status).0,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope `code` value.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound(_) => "RouteNotFound",
            GatewayError::BadRequest(_)
            | GatewayError::InvalidTimeout(_)
            | GatewayError::BodyRead(_) => "BadRequest",
            GatewayError::PayloadTooLarge { .. } => "PayloadTooLarge",
            GatewayError::BackendUnavailable(_) => "BackendUnavailable",
            GatewayError::DeadlineExceeded(_) => "DeadlineExceeded",
            GatewayError::Rpc(status) => crate::translate::code_name(status.code),
            GatewayError::Internal(_) => "Internal",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            GatewayError::Rpc(status) => encode_failure(status).1,
            GatewayError::BadRequest(err) => {
                ErrorEnvelope::new(self.code(), err.to_string()).with_details(err.details())
            }
            GatewayError::Internal(_) => ErrorEnvelope::new(self.code(), "internal error"),
            other => ErrorEnvelope::new(other.code(), other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}

/// Build a JSON success response carrying RPC response metadata.
pub fn success(status: StatusCode, body: Value, metadata: &MetadataMap) -> Response {
    (status, reply_headers(metadata), Json(body)).into_response()
}

/// `Grpc-Metadata-<k>` headers for the non-reserved response metadata.
pub fn reply_headers(metadata: &MetadataMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in metadata.clone().into_headers().iter() {
        let key = name.as_str();
        if key.ends_with("-bin") || RESERVED_METADATA.contains(&key) {
            continue;
        }
        let Ok(name) = HeaderName::try_from(format!("{GRPC_METADATA_PREFIX}{key}")) else {
            continue;
        };
        let value: HeaderValue = value.clone();
        headers.append(name, value);
    }
    headers
}
