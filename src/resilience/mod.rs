//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound HTTP request
//!     → timeouts.rs (Grpc-Timeout header → bounded deadline)
//!     → deadline enforced around the backend call (gateway side)
//!     → same deadline sent as grpc-timeout (RPC side enforces it too)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - No retries: a failed call is reported once, never replayed
//! - Timed-out requests return 504 Gateway Timeout

pub mod timeouts;
