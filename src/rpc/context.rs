//! Per-call context: deadline, cancellation and inbound metadata.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tonic::metadata::MetadataMap;

use crate::resilience::timeouts::{parse_grpc_timeout, GRPC_TIMEOUT_HEADER};

/// Context handed to every handler invocation.
///
/// Cloning is cheap; all clones share one cancellation token.
#[derive(Debug, Clone)]
pub struct CallContext {
    method: &'static str,
    deadline: Option<Instant>,
    token: CancellationToken,
    metadata: MetadataMap,
}

impl CallContext {
    pub fn new(method: &'static str, deadline: Option<Instant>, metadata: MetadataMap) -> Self {
        Self {
            method,
            deadline,
            token: CancellationToken::new(),
            metadata,
        }
    }

    /// Build a context from inbound call metadata.
    ///
    /// A malformed `grpc-timeout` is ignored (no deadline), matching how gRPC
    /// servers treat unparsable timeouts.
    pub fn from_metadata(method: &'static str, metadata: &MetadataMap) -> Self {
        let deadline = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_grpc_timeout(v).ok())
            .map(|timeout| Instant::now() + timeout);
        Self::new(method, deadline, metadata.clone())
    }

    pub fn method(&self) -> &'static str {
        self.method
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when the call has no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Look up an ASCII metadata value.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.to_str().ok())
    }

    pub fn metadata_map(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the call is cancelled or its deadline fired.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Guard that cancels this context when dropped.
    pub(crate) fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }
}
