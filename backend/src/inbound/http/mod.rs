//! HTTP inbound adapter.
//!
//! Routes are mounted under `/api/v1`; health probes sit at the root.

pub mod accounts;
pub mod admin;
pub mod cache_control;
pub mod error;
pub mod forms;
pub mod gate;
pub mod health;
pub mod member;
pub mod session;
pub mod session_config;
pub mod state;
#[cfg(test)]
pub mod test_utils;

use actix_web::web;

pub use error::ApiResult;

/// Mount every API route on `cfg`.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(accounts::register)
        .service(accounts::login)
        .service(accounts::logout)
        .service(accounts::current_session)
        .configure(member::configure)
        .configure(admin::configure);
}
