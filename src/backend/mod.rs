//! Outbound RPC calls made by the gateway.
//!
//! # Responsibilities
//! - Define the [`RpcBackend`] seam the gateway calls through
//! - Carry the translated payload, forwarded metadata and deadline
//! - Separate transport failures from coded RPC failures
//!
//! # Design Decisions
//! - Payloads cross the seam as proto-named JSON so the gateway stays
//!   independent of the generated message types
//! - A failure with an underlying transport error is `Unavailable`, never a
//!   business status; there is no retry

pub mod grpc;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tonic::metadata::MetadataMap;

use crate::contract::MethodDescriptor;
use crate::rpc::RpcStatus;

pub use grpc::GrpcBackend;

/// One outbound unary call.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub payload: Value,
    pub metadata: MetadataMap,
    pub timeout: Duration,
}

/// Successful reply: response message plus response metadata.
#[derive(Debug, Clone)]
pub struct RpcReply {
    pub payload: Value,
    pub metadata: MetadataMap,
}

/// Why a backend call did not produce a reply.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    /// The RPC server answered with a failure status.
    #[error(transparent)]
    Status(RpcStatus),
    /// The RPC server could not be reached or the connection broke.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("method {0} is not served by this backend")]
    UnknownMethod(&'static str),
    #[error("message conversion failed: {0}")]
    Conversion(String),
}

/// Anything that can execute a unary call for the gateway.
#[async_trait]
pub trait RpcBackend: Send + Sync + 'static {
    async fn call(
        &self,
        method: &'static MethodDescriptor,
        call: OutboundCall,
    ) -> Result<RpcReply, BackendError>;
}
