//! Registration, login and logout.

use std::sync::Arc;

use mockable::Clock;
use tracing::{debug, info, warn};

use super::ports::{AuthGateway, DataService, Table};
use super::service_support::{insert_one, map_auth_error};
use super::{
    Credentials, Error, MemberProfile, PhoneNumber, RawSession, Registration, ResolvedSession,
    SessionResolver, parse_email,
};

/// Default domain of synthetic emails for members who register by phone.
pub const DEFAULT_PSEUDO_EMAIL_DOMAIN: &str = "members.chama.local";

#[derive(Clone)]
pub struct AccountService {
    auth: Arc<dyn AuthGateway>,
    data: Arc<dyn DataService>,
    resolver: SessionResolver,
    clock: Arc<dyn Clock>,
    pseudo_email_domain: String,
}

impl AccountService {
    pub fn new(
        auth: Arc<dyn AuthGateway>,
        data: Arc<dyn DataService>,
        clock: Arc<dyn Clock>,
        pseudo_email_domain: impl Into<String>,
    ) -> Self {
        let resolver = SessionResolver::new(Arc::clone(&data), Arc::clone(&clock));
        Self {
            auth,
            data,
            resolver,
            clock,
            pseudo_email_domain: pseudo_email_domain.into(),
        }
    }

    #[must_use]
    pub const fn resolver(&self) -> &SessionResolver {
        &self.resolver
    }

    /// Create the principal and its member profile.
    pub async fn register(&self, registration: &Registration) -> Result<MemberProfile, Error> {
        let email = registration
            .email
            .clone()
            .unwrap_or_else(|| registration.phone.pseudo_email(&self.pseudo_email_domain));
        let credentials = Credentials::try_from_parts(&email, &registration.password)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let principal = self
            .auth
            .sign_up(&credentials)
            .await
            .map_err(map_auth_error)?;

        let profile = MemberProfile::new(
            principal.id,
            registration.full_name.clone(),
            registration.phone.as_str(),
            self.clock.utc(),
        );
        let stored = insert_one(&*self.data, Table::Profiles, &profile).await?;
        info!(user_id = %principal.id, "member registered");
        Ok(stored.unwrap_or(profile))
    }

    /// Authenticate with an email or a phone number and classify the result.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<(RawSession, ResolvedSession), Error> {
        let email = self.login_email(identifier)?;
        let credentials = Credentials::try_from_parts(&email, password)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        let session = self
            .auth
            .sign_in(&credentials)
            .await
            .map_err(map_auth_error)?;
        let resolved = self.resolver.resolve(Some(&session)).await;
        info!(user_id = %session.user.id, admin = resolved.is_admin(), "signed in");
        Ok((session, resolved))
    }

    /// Revoke `session` remotely. Failures are logged; the caller clears its
    /// local copy regardless.
    pub async fn logout(&self, session: &RawSession) {
        match self.auth.sign_out(session).await {
            Ok(()) => info!(user_id = %session.user.id, "signed out"),
            Err(error) => warn!(user_id = %session.user.id, %error, "remote sign-out failed"),
        }
    }

    /// Swap an expired session for a fresh one. `None` means the session is
    /// gone and the caller should treat the request as anonymous.
    pub async fn renew(&self, session: RawSession) -> Option<RawSession> {
        if !session.is_expired_at(self.clock.utc()) {
            return Some(session);
        }
        match self.auth.refresh(&session).await {
            Ok(fresh) => {
                debug!(user_id = %fresh.user.id, "session refreshed");
                Some(fresh)
            }
            Err(error) => {
                warn!(user_id = %session.user.id, %error, "session refresh failed");
                None
            }
        }
    }

    pub async fn resolve(&self, session: Option<&RawSession>) -> ResolvedSession {
        self.resolver.resolve(session).await
    }

    fn login_email(&self, identifier: &str) -> Result<String, Error> {
        let trimmed = identifier.trim();
        if trimmed.contains('@') {
            return parse_email(trimmed).map_err(|err| Error::invalid_request(err.to_string()));
        }
        PhoneNumber::parse(trimmed)
            .map(|phone| phone.pseudo_email(&self.pseudo_email_domain))
            .map_err(|err| Error::invalid_request(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{AuthError, MockAuthGateway, MockDataService, Row};
    use crate::domain::{ErrorCode, Principal, PrincipalId, RegistrationForm};
    use mockable::DefaultClock;
    use rstest::rstest;

    fn service(auth: MockAuthGateway, data: MockDataService) -> AccountService {
        AccountService::new(
            Arc::new(auth),
            Arc::new(data),
            Arc::new(DefaultClock),
            "members.example",
        )
    }

    fn registration(email: Option<&str>) -> Registration {
        RegistrationForm {
            full_name: "Achieng Odhiambo",
            phone: "+254 712 345 678",
            password: "secret1",
            email,
        }
        .validate()
        .expect("valid form")
    }

    #[tokio::test]
    async fn phone_only_registration_uses_pseudo_email() {
        let id = PrincipalId::random();
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up()
            .withf(|creds| creds.email() == "254712345678@members.example")
            .returning(move |_| Ok(Principal { id, email: None }));
        let mut data = MockDataService::new();
        data.expect_insert()
            .withf(|table, rows| *table == Table::Profiles && rows.len() == 1)
            .returning(|_, rows| Ok(rows));
        let profile = service(auth, data)
            .register(&registration(None))
            .await
            .expect("registered");
        assert_eq!(profile.user_id, id);
        assert_eq!(profile.phone_number, "+254712345678");
        assert!(!profile.balance_visible);
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up()
            .withf(|creds| creds.email() == "achieng@example.org")
            .returning(|_| Err(AuthError::already_registered()));
        let mut data = MockDataService::new();
        data.expect_insert().never();
        let err = service(auth, data)
            .register(&registration(Some("Achieng@Example.org")))
            .await
            .expect_err("duplicate");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[rstest]
    #[case("0712 345 678", "0712345678@members.example")]
    #[case(" Admin@Example.org ", "admin@example.org")]
    #[tokio::test]
    async fn login_accepts_phone_or_email(#[case] identifier: &str, #[case] expected: &'static str) {
        let id = PrincipalId::random();
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_in()
            .withf(move |creds| creds.email() == expected)
            .returning(move |_| {
                Ok(RawSession {
                    access_token: "token".to_owned(),
                    refresh_token: None,
                    expires_at: None,
                    user: Principal { id, email: None },
                })
            });
        let mut data = MockDataService::new();
        data.expect_select().returning(|_| Ok(Vec::new()));
        data.expect_update().returning(|_, _, _| Ok(Vec::<Row>::new()));
        let (_, resolved) = service(auth, data)
            .login(identifier, "secret1")
            .await
            .expect("login");
        assert!(!resolved.is_admin());
    }

    #[tokio::test]
    async fn bad_password_is_unauthorized() {
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_in()
            .returning(|_| Err(AuthError::invalid_credentials()));
        let err = service(auth, MockDataService::new())
            .login("a@b.co", "nope")
            .await
            .expect_err("rejected");
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn malformed_identifier_is_rejected_locally() {
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_in().never();
        let err = service(auth, MockDataService::new())
            .login("12ab", "secret1")
            .await
            .expect_err("invalid");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    fn session_expiring(offset_secs: i64) -> RawSession {
        RawSession {
            access_token: "token".to_owned(),
            refresh_token: Some("refresh".to_owned()),
            expires_at: Some(chrono::Utc::now() + chrono::Duration::seconds(offset_secs)),
            user: Principal {
                id: PrincipalId::random(),
                email: None,
            },
        }
    }

    #[tokio::test]
    async fn live_session_is_kept_without_refresh() {
        let mut auth = MockAuthGateway::new();
        auth.expect_refresh().never();
        let kept = service(auth, MockDataService::new())
            .renew(session_expiring(600))
            .await
            .expect("still live");
        assert_eq!(kept.access_token, "token");
    }

    #[tokio::test]
    async fn failed_refresh_drops_the_session() {
        let mut auth = MockAuthGateway::new();
        auth.expect_refresh()
            .times(1)
            .returning(|_| Err(AuthError::session_expired()));
        let renewed = service(auth, MockDataService::new())
            .renew(session_expiring(-5))
            .await;
        assert!(renewed.is_none());
    }
}
