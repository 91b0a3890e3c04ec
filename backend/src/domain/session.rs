//! Session values exchanged with the authentication subsystem and the
//! resolved authorization level derived from them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Principal;

/// Token bundle issued by the authentication subsystem.
///
/// Stored verbatim in the encrypted session cookie, so the serialised shape is
/// part of the cookie contract.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: Principal,
}

impl RawSession {
    /// True when the access token has an expiry at or before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

impl fmt::Debug for RawSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSession")
            .field("user", &self.user)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Kind of a session-changed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    Other,
}

/// Push notification from the authentication subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<RawSession>,
}

impl AuthEvent {
    #[must_use]
    pub const fn new(kind: AuthEventKind, session: Option<RawSession>) -> Self {
        Self { kind, session }
    }

    #[must_use]
    pub const fn signed_out() -> Self {
        Self::new(AuthEventKind::SignedOut, None)
    }
}

/// Authorization level of a session: `{principal, isAdmin}`.
///
/// `is_admin` is never true without a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSession {
    principal: Option<Principal>,
    is_admin: bool,
}

impl ResolvedSession {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self {
            principal: None,
            is_admin: false,
        }
    }

    #[must_use]
    pub const fn member(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            is_admin: false,
        }
    }

    #[must_use]
    pub const fn admin(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            is_admin: true,
        }
    }

    #[must_use]
    pub const fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.is_admin
    }
}

/// States of the per-instance session machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Initializing,
    Anonymous,
    Member(Principal),
    Admin(Principal),
}

impl SessionPhase {
    /// `None` while still initializing.
    #[must_use]
    pub fn resolved(&self) -> Option<ResolvedSession> {
        match self {
            Self::Initializing => None,
            Self::Anonymous => Some(ResolvedSession::anonymous()),
            Self::Member(principal) => Some(ResolvedSession::member(principal.clone())),
            Self::Admin(principal) => Some(ResolvedSession::admin(principal.clone())),
        }
    }

    #[must_use]
    pub const fn is_initializing(&self) -> bool {
        matches!(self, Self::Initializing)
    }

    /// Short label used in logs and health payloads.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Anonymous => "anonymous",
            Self::Member(_) => "member",
            Self::Admin(_) => "admin",
        }
    }
}

impl From<ResolvedSession> for SessionPhase {
    fn from(resolved: ResolvedSession) -> Self {
        match (resolved.principal, resolved.is_admin) {
            (None, _) => Self::Anonymous,
            (Some(principal), true) => Self::Admin(principal),
            (Some(principal), false) => Self::Member(principal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PrincipalId;

    fn principal() -> Principal {
        Principal {
            id: PrincipalId::random(),
            email: Some("member@example.org".to_owned()),
        }
    }

    #[test]
    fn phases_round_trip_through_resolved_sessions() {
        let who = principal();
        for resolved in [
            ResolvedSession::anonymous(),
            ResolvedSession::member(who.clone()),
            ResolvedSession::admin(who.clone()),
        ] {
            assert_eq!(SessionPhase::from(resolved.clone()).resolved(), Some(resolved));
        }
        assert_eq!(SessionPhase::Initializing.resolved(), None);
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let session = RawSession {
            access_token: "token".to_owned(),
            refresh_token: None,
            expires_at: Some(now),
            user: principal(),
        };
        assert!(session.is_expired_at(now));
        assert!(!RawSession { expires_at: None, ..session }.is_expired_at(now));
    }

    #[test]
    fn debug_output_hides_tokens() {
        let session = RawSession {
            access_token: "very-secret".to_owned(),
            refresh_token: Some("also-secret".to_owned()),
            expires_at: None,
            user: principal(),
        };
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("also-secret"));
    }

    #[test]
    fn resolved_session_uses_camel_case() {
        let value = serde_json::to_value(ResolvedSession::anonymous()).expect("serialise");
        assert_eq!(value, serde_json::json!({ "principal": null, "isAdmin": false }));
    }
}
