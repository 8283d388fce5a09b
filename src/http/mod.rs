//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, panic recovery)
//!     → request.rs (buffer into HttpExchange, deadline, metadata)
//!     → routing (binding lookup) → translate (HTTP → RPC message)
//!     → backend (unary RPC call under the deadline)
//!     → response.rs (JSON body or error envelope, metadata headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{HttpExchange, X_REQUEST_ID};
pub use response::GatewayError;
pub use server::{Gateway, GatewayState, HttpServer};
