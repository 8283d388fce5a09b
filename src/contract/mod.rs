//! Service contract subsystem.
//!
//! # Data Flow
//! ```text
//! example.rs (static ServiceDescriptor)
//!     → routing (HTTP rules compiled into MethodBindings at startup)
//!     → translate (MessageSchema drives JSON ↔ message conversion)
//!     → rpc / backend (method names and gRPC paths)
//! ```
//!
//! # Design Decisions
//! - Pure declaration: descriptors are `'static` data, no behaviour
//! - RPC-only methods simply declare no HTTP rules
//! - Field kinds cover protobuf scalars and nested messages
//! - The gRPC service/client glue is generated by `build.rs` from the
//!   same method names declared here

pub mod example;
pub mod schema;

pub use schema::{
    BodyMapping, FieldDescriptor, FieldKind, HttpRule, HttpVerb, MessageSchema,
    MethodDescriptor, ServiceDescriptor,
};
