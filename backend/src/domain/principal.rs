//! Authenticated identities, credentials and role tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use zeroize::Zeroizing;

/// Stable identifier issued by the authentication subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, example = "3fa85f64-5717-4562-b3fc-2c963f66afa6")]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PrincipalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identity attached to a resolved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: PrincipalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Capability tag stored in `user_roles`. Members carry no row at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
        }
    }
}

/// Row shape of the `user_roles` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user_id: PrincipalId,
    pub role: Role,
}

impl RoleAssignment {
    #[must_use]
    pub const fn admin(user_id: PrincipalId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }
}

/// Reasons raw credentials are refused before reaching the auth subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialsError {
    #[error("login identifier must not be empty")]
    EmptyIdentifier,
    #[error("password must not be empty")]
    EmptyPassword,
}

/// Email/password pair handed to the authentication subsystem.
///
/// The email is trimmed; the password is kept verbatim and wiped on drop.
///
/// # Examples
/// ```
/// use chama::domain::Credentials;
///
/// let creds = Credentials::try_from_parts("  admin@example.org ", "s3cret").unwrap();
/// assert_eq!(creds.email(), "admin@example.org");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, CredentialsError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(CredentialsError::EmptyIdentifier);
        }
        if password.is_empty() {
            return Err(CredentialsError::EmptyPassword);
        }
        Ok(Self {
            email: email.to_owned(),
            password: Zeroizing::new(password.to_owned()),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "pw", CredentialsError::EmptyIdentifier)]
    #[case("   ", "pw", CredentialsError::EmptyIdentifier)]
    #[case("a@b.c", "", CredentialsError::EmptyPassword)]
    fn rejects_blank_parts(
        #[case] email: &str,
        #[case] password: &str,
        #[case] expected: CredentialsError,
    ) {
        let err = Credentials::try_from_parts(email, password).expect_err("must fail");
        assert_eq!(err, expected);
    }

    #[test]
    fn debug_output_hides_password() {
        let creds = Credentials::try_from_parts("a@b.c", "hunter2").expect("valid");
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn role_rows_use_lowercase_tags() {
        let row = serde_json::to_value(RoleAssignment::admin(PrincipalId::random()))
            .expect("serialise");
        assert_eq!(row["role"], "admin");
    }
}
