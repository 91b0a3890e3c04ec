//! Outbound adapters implementing domain ports.
//!
//! - **remote**: the hosted backend over HTTP, plus an in-memory double used
//!   for local development and tests.
//!
//! Adapters translate between wire shapes and domain rows. They contain no
//! business logic.

pub mod remote;
