//! Cache-control policies for HTTP responses.

use actix_web::http::header::{CACHE_CONTROL, HeaderName};

/// Member and admin data is per-user and must never be reused.
pub const PRIVATE_NO_STORE: &str = "private, no-store";

/// Probes must always hit the process.
pub const NO_STORE: &str = "no-store";

pub const fn private_no_store() -> (HeaderName, &'static str) {
    (CACHE_CONTROL, PRIVATE_NO_STORE)
}

pub const fn no_store() -> (HeaderName, &'static str) {
    (CACHE_CONTROL, NO_STORE)
}
