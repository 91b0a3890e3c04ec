//! Shared HTTP adapter state.
//!
//! Handlers receive this through `web::Data` and only see domain services,
//! so they stay testable against in-memory adapters.

use crate::domain::{AccountService, AdminService, MemberService, SMS_LOG_PAGE};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub accounts: AccountService,
    pub members: MemberService,
    pub admin: AdminService,
    /// Upper bound for `GET /admin/sms-logs?limit=`.
    pub sms_log_page: usize,
}

impl HttpState {
    #[must_use]
    pub const fn new(accounts: AccountService, members: MemberService, admin: AdminService) -> Self {
        Self {
            accounts,
            members,
            admin,
            sms_log_page: SMS_LOG_PAGE,
        }
    }
}
