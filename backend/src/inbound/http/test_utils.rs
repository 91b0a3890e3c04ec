//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::dev::ServiceResponse;
use mockable::DefaultClock;

use super::state::HttpState;
use crate::domain::{
    AccountService, AdminService, MemberService, PaymentService, SmsNotifier,
};
use crate::outbound::remote::MemoryRemote;

/// Session middleware with a fresh key and `Secure` off for plain-HTTP tests.
pub fn test_session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

/// The `session` cookie set by `res`.
pub fn session_cookie<B>(res: &ServiceResponse<B>) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|cookie| cookie.name() == "session")
        .map(Cookie::into_owned)
        .expect("session cookie set")
}

/// Handler state wired to a fresh in-memory remote.
pub fn memory_state() -> (HttpState, MemoryRemote) {
    let clock = Arc::new(DefaultClock);
    let remote = MemoryRemote::new(clock.clone());
    let data = Arc::new(remote.clone());
    let functions = Arc::new(remote.clone());
    let accounts = AccountService::new(
        Arc::new(remote.clone()),
        data.clone(),
        clock.clone(),
        "members.test",
    );
    let members = MemberService::new(
        data.clone(),
        PaymentService::new(data.clone(), functions.clone()),
        clock.clone(),
    );
    let admin = AdminService::new(data, SmsNotifier::new(functions), clock);
    (HttpState::new(accounts, members, admin), remote)
}
