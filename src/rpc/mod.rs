//! RPC server subsystem.
//!
//! # Data Flow
//! ```text
//! gRPC call (HTTP/2 stream)
//!     → server.rs (tonic Server, one task per call)
//!     → service.rs (CallContext from metadata, deadline, panic recovery)
//!     → handler.rs (business logic behind the ExampleHandler trait)
//!     → status.rs (StatusOutcome → tonic::Status on failure)
//! ```
//!
//! # Design Decisions
//! - Business logic is a capability trait; any implementation can be served
//! - Deadlines come from `grpc-timeout` and are enforced here, not trusted
//!   to the handler
//! - Dropping a call future cancels its context
//! - Handler errors always carry a status code; panics become `Internal`

pub mod context;
pub mod handler;
pub mod server;
pub mod service;
pub mod status;

pub use context::CallContext;
pub use handler::{ExampleHandler, GreetingHandler};
pub use server::RpcServer;
pub use service::RpcService;
pub use status::{RpcStatus, StatusOutcome};
