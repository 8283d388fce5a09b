//! Coded call outcomes.
//!
//! `StatusOutcome<T>` is the closed result of every call: `Ok(T)` or a
//! `RpcStatus` failure carrying a code, a message and optional structured
//! details. Details cross the wire as JSON in the gRPC status details bytes.

use bytes::Bytes;
use serde_json::Value;
use tonic::{Code, Status};

/// Success-or-coded-failure result of a call.
pub type StatusOutcome<T> = Result<T, RpcStatus>;

/// Failure half of a [`StatusOutcome`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct RpcStatus {
    pub code: Code,
    pub message: String,
    pub details: Option<Value>,
}

impl RpcStatus {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(Code::DeadlineExceeded, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    /// Wrap an uncoded error so it never crosses the RPC boundary raw.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::new(Code::Internal, err.to_string())
    }
}

impl From<RpcStatus> for Status {
    fn from(status: RpcStatus) -> Self {
        match status.details {
            Some(details) => {
                let bytes = serde_json::to_vec(&details).unwrap_or_default();
                Status::with_details(status.code, status.message, Bytes::from(bytes))
            }
            None => Status::new(status.code, status.message),
        }
    }
}

impl From<&Status> for RpcStatus {
    fn from(status: &Status) -> Self {
        let details = if status.details().is_empty() {
            None
        } else {
            serde_json::from_slice::<Value>(status.details())
                .ok()
                .filter(Value::is_object)
        };
        Self {
            code: status.code(),
            message: status.message().to_string(),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_details_survive_the_wire_form() {
        let original = RpcStatus::not_found("no such greeting")
            .with_details(json!({"name": "ghost"}));
        let wire: Status = original.clone().into();
        assert_eq!(wire.code(), Code::NotFound);

        let back = RpcStatus::from(&wire);
        assert_eq!(back, original);
    }

    #[test]
    fn test_opaque_details_are_dropped() {
        let wire = Status::with_details(Code::Internal, "boom", Bytes::from_static(b"\x08\x01"));
        let back = RpcStatus::from(&wire);
        assert_eq!(back.details, None);
        assert_eq!(back.message, "boom");
    }

    #[test]
    fn test_internal_wraps_display() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let status = RpcStatus::internal(err);
        assert_eq!(status.code, Code::Internal);
        assert_eq!(status.message, "disk on fire");
    }
}
