//! Savings-group backend.
//!
//! The crate is split hexagonally: [`domain`] holds the rules and ports,
//! [`inbound`] adapts HTTP onto domain services and [`outbound`] talks to the
//! hosted auth/data/function backend.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
