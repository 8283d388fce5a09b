//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (coordinator.rs):
//!     Bind RPC + HTTP listeners → Build routes and backend → Spawn both servers
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Gateway drains → RPC server drains → Abort at deadline
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Listeners bind before any task starts: a bind failure is a startup error
//! - No readiness ordering between servers; early gateway calls may see 503
//! - Shutdown has one deadline shared by both servers

pub mod coordinator;
pub mod shutdown;
pub mod signals;

pub use coordinator::{Coordinator, LifecycleError, RunningServers};
pub use shutdown::{DrainOutcome, Shutdown, ShutdownReport};
pub use signals::shutdown_signal;
