//! Wire shapes of the hosted auth and REST endpoints.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Principal, PrincipalId, RawSession};

#[derive(Debug, Serialize)]
pub(super) struct PasswordGrantDto<'a> {
    pub(super) email: &'a str,
    pub(super) password: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshGrantDto<'a> {
    pub(super) refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct UserDto {
    pub(super) id: Uuid,
    #[serde(default)]
    pub(super) email: Option<String>,
}

impl From<UserDto> for Principal {
    fn from(user: UserDto) -> Self {
        Self {
            id: PrincipalId::from_uuid(user.id),
            email: user.email.filter(|email| !email.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct SessionDto {
    pub(super) access_token: String,
    #[serde(default)]
    pub(super) refresh_token: Option<String>,
    /// Seconds until expiry.
    #[serde(default)]
    pub(super) expires_in: Option<i64>,
    /// Unix timestamp of expiry; preferred over `expires_in`.
    #[serde(default)]
    pub(super) expires_at: Option<i64>,
    pub(super) user: UserDto,
}

impl SessionDto {
    pub(super) fn into_session(self, now: DateTime<Utc>) -> RawSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .and_then(Duration::try_seconds)
                    .map(|ttl| now + ttl)
            });
        RawSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into(),
        }
    }
}

/// Sign-up answers with a session when confirmation is off, else a user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SignUpDto {
    Session(SessionDto),
    User(UserDto),
}

impl SignUpDto {
    pub(super) fn into_principal(self) -> Principal {
        match self {
            Self::Session(session) => session.user.into(),
            Self::User(user) => user.into(),
        }
    }
}

/// Error body of the auth endpoints; field names vary between versions.
#[derive(Debug, Default, Deserialize)]
pub(super) struct AuthErrorDto {
    #[serde(default)]
    pub(super) error: Option<String>,
    #[serde(default)]
    pub(super) error_code: Option<String>,
    #[serde(default)]
    pub(super) error_description: Option<String>,
    #[serde(default)]
    pub(super) msg: Option<String>,
    #[serde(default)]
    pub(super) message: Option<String>,
}

impl AuthErrorDto {
    pub(super) fn code(&self) -> &str {
        self.error_code
            .as_deref()
            .or(self.error.as_deref())
            .unwrap_or_default()
    }

    pub(super) fn text(&self) -> &str {
        self.msg
            .as_deref()
            .or(self.error_description.as_deref())
            .or(self.message.as_deref())
            .unwrap_or_default()
    }
}

/// Error body of the REST endpoints.
#[derive(Debug, Default, Deserialize)]
pub(super) struct RestErrorDto {
    #[serde(default)]
    pub(super) code: Option<String>,
    #[serde(default)]
    pub(super) message: Option<String>,
}
