//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Startup
//!     → listener.rs (bind both ports before any server runs)
//!
//! Incoming TCP connection (gateway)
//!     → listener.rs (accept, connection limit)
//!     → connection.rs (ID, active count, drain on shutdown)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Binding is fail-fast: a taken port aborts startup
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
