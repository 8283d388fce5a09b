//! Message translation between REST/JSON and RPC messages.
//!
//! # Data Flow
//! ```text
//! HTTP request → request.rs (path, query, body → proto-named JSON)
//!     → backend call (typed prost message)
//!     → response.rs (JSON names, protojson scalars) or failure envelope
//!     → status_map.rs (gRPC code → HTTP status)
//! ```
//!
//! # Design Decisions
//! - Pure and stateless: every function is a plain transformation
//! - Type checks are strict; a JSON string field never accepts a number
//! - Translation errors never reach the backend

pub mod request;
pub mod response;
pub mod status_map;

use serde_json::{json, Value};

pub use request::decode_request;
pub use response::{encode_failure, encode_response, ErrorEnvelope};
pub use status_map::{code_name, http_status, ALL_CODES};

/// Why an HTTP request could not be turned into an RPC request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("request body must be a JSON object")]
    BodyNotObject,
    #[error("field `{field}` expects {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("missing required field `{0}`")]
    MissingField(String),
    #[error("field `{field}` has invalid {expected} value {value}")]
    InvalidValue {
        field: String,
        expected: &'static str,
        value: String,
    },
}

impl TranslateError {
    /// Structured details for the error envelope.
    pub fn details(&self) -> Option<Value> {
        match self {
            TranslateError::TypeMismatch {
                field,
                expected,
                found,
            } => Some(json!({"field": field, "expected": expected, "found": found})),
            TranslateError::InvalidValue {
                field,
                expected,
                value,
            } => Some(json!({"field": field, "expected": expected, "found": value})),
            TranslateError::MissingField(field) => Some(json!({"field": field})),
            TranslateError::InvalidJson(_) | TranslateError::BodyNotObject => None,
        }
    }
}
