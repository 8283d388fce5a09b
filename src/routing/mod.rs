//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (binding lookup, most specific first)
//!     → matcher.rs (template match, parameter extraction)
//!     → Return: MethodBinding + path params, or RouteNotFound
//!
//! Route Compilation (at startup):
//!     ServiceDescriptor HTTP rules
//!     → Parse templates, check fields against the request schema
//!     → Reject ambiguous bindings
//!     → Sort by specificity
//!     → Freeze as immutable RoutingTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - Most-specific match wins (literal segments beat parameters)

pub mod matcher;
pub mod router;

pub use matcher::{PathTemplate, Segment, TemplateError};
pub use router::{MethodBinding, RouteError, RouteMatch, RouteNotFound, RoutingTable};
