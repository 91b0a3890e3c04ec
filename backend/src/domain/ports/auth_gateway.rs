//! Driven port for the hosted authentication subsystem.

use async_trait::async_trait;

use crate::domain::{Credentials, Principal, RawSession};

use super::define_port_error;

define_port_error! {
    /// Failures reported by authentication adapters.
    pub enum AuthError {
        /// Email/password pair did not match a principal.
        InvalidCredentials => "invalid login credentials",
        /// Sign-up refused because the identifier is taken.
        AlreadyRegistered => "an account with this identifier already exists",
        /// Session token is expired or revoked.
        SessionExpired => "session has expired",
        /// Request rejected for another reason.
        Rejected { message: String } => "authentication request rejected: {message}",
        /// Subsystem unreachable or timing out.
        Unavailable { message: String } => "authentication service unavailable: {message}",
    }
}

/// Stateless calls against the authentication subsystem.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Create a principal for `credentials`.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Principal, AuthError>;

    /// Exchange credentials for a session.
    async fn sign_in(&self, credentials: &Credentials) -> Result<RawSession, AuthError>;

    /// Revoke `session` remotely.
    async fn sign_out(&self, session: &RawSession) -> Result<(), AuthError>;

    /// Trade the refresh token of `session` for a fresh session.
    async fn refresh(&self, session: &RawSession) -> Result<RawSession, AuthError>;
}
