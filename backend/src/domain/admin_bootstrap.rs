//! Ensures a privileged principal exists before normal use.
//!
//! The store carries a uniqueness constraint on the `admin` role tag, so two
//! racing bootstraps cannot both attach it: the loser sees a conflict and
//! treats the role as already present.

use std::sync::Arc;

use tracing::{info, warn};

use super::ports::{
    AuthError, AuthGateway, DataService, Query, QueryError, RowFilter, Table, encode_row,
};
use super::{Credentials, PrincipalId, Role, RoleAssignment};

/// What a bootstrap run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Some principal already holds the admin role.
    AlreadyPresent,
    /// A new principal was created and made admin.
    Created(PrincipalId),
    /// The configured principal already existed and was made admin.
    Promoted(PrincipalId),
    /// A step failed; the failure was logged.
    Failed,
}

#[derive(Debug, thiserror::Error)]
enum BootstrapError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

#[derive(Clone)]
pub struct AdminBootstrap {
    auth: Arc<dyn AuthGateway>,
    data: Arc<dyn DataService>,
}

impl AdminBootstrap {
    pub fn new(auth: Arc<dyn AuthGateway>, data: Arc<dyn DataService>) -> Self {
        Self { auth, data }
    }

    /// Make sure an admin exists. Never fails: errors are logged and reported
    /// as [`BootstrapOutcome::Failed`].
    pub async fn ensure_admin(&self, credentials: &Credentials) -> BootstrapOutcome {
        match self.run(credentials).await {
            Ok(outcome) => {
                info!(?outcome, email = credentials.email(), "admin bootstrap finished");
                outcome
            }
            Err(error) => {
                warn!(%error, email = credentials.email(), "admin bootstrap failed");
                BootstrapOutcome::Failed
            }
        }
    }

    async fn run(&self, credentials: &Credentials) -> Result<BootstrapOutcome, BootstrapError> {
        if self.any_admin().await? {
            return Ok(BootstrapOutcome::AlreadyPresent);
        }
        match self.auth.sign_up(credentials).await {
            Ok(principal) => Ok(if self.grant_admin(principal.id).await? {
                BootstrapOutcome::Created(principal.id)
            } else {
                BootstrapOutcome::AlreadyPresent
            }),
            Err(AuthError::AlreadyRegistered) => self.promote_existing(credentials).await,
            Err(error) => Err(error.into()),
        }
    }

    /// Sign in as the existing principal, attach the role if missing, then
    /// sign out again whatever happened in between.
    async fn promote_existing(
        &self,
        credentials: &Credentials,
    ) -> Result<BootstrapOutcome, BootstrapError> {
        let session = self.auth.sign_in(credentials).await?;
        let id = session.user.id;
        let promoted = self.promote(id).await;
        if let Err(error) = self.auth.sign_out(&session).await {
            warn!(user_id = %id, %error, "bootstrap sign-out failed");
        }
        Ok(if promoted? {
            BootstrapOutcome::Promoted(id)
        } else {
            BootstrapOutcome::AlreadyPresent
        })
    }

    async fn promote(&self, id: PrincipalId) -> Result<bool, QueryError> {
        let existing = self
            .data
            .select(
                &Query::from(Table::UserRoles)
                    .filter(RowFilter::eq("user_id", id))
                    .filter(RowFilter::eq("role", Role::Admin.as_str()))
                    .limit(1),
            )
            .await?;
        if !existing.is_empty() {
            return Ok(false);
        }
        self.grant_admin(id).await
    }

    async fn any_admin(&self) -> Result<bool, QueryError> {
        let rows = self
            .data
            .select(
                &Query::from(Table::UserRoles)
                    .filter(RowFilter::eq("role", Role::Admin.as_str()))
                    .limit(1),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    /// Insert the admin role; a uniqueness conflict means another run won.
    async fn grant_admin(&self, id: PrincipalId) -> Result<bool, QueryError> {
        let row = encode_row(&RoleAssignment::admin(id))?;
        match self.data.insert(Table::UserRoles, vec![row]).await {
            Ok(_) => Ok(true),
            Err(QueryError::Conflict { message }) => {
                info!(user_id = %id, %message, "admin role already present");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockAuthGateway, MockDataService, Row};
    use crate::domain::{Principal, RawSession};
    use mockall::Sequence;

    fn credentials() -> Credentials {
        Credentials::try_from_parts("admin@example.org", "secret1").expect("credentials")
    }

    fn session(id: PrincipalId) -> RawSession {
        RawSession {
            access_token: "token".to_owned(),
            refresh_token: None,
            expires_at: None,
            user: Principal { id, email: None },
        }
    }

    fn bootstrap(auth: MockAuthGateway, data: MockDataService) -> AdminBootstrap {
        AdminBootstrap::new(Arc::new(auth), Arc::new(data))
    }

    #[tokio::test]
    async fn existing_admin_is_a_no_op() {
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up().never();
        let mut data = MockDataService::new();
        data.expect_select().times(1).returning(|_| Ok(vec![Row::new()]));
        data.expect_insert().never();
        let outcome = bootstrap(auth, data).ensure_admin(&credentials()).await;
        assert_eq!(outcome, BootstrapOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn creates_admin_when_none_exists() {
        let id = PrincipalId::random();
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up()
            .times(1)
            .returning(move |_| Ok(Principal { id, email: None }));
        let mut data = MockDataService::new();
        data.expect_select().times(1).returning(|_| Ok(Vec::new()));
        data.expect_insert()
            .times(1)
            .withf(move |table, rows| {
                *table == Table::UserRoles
                    && rows.len() == 1
                    && rows[0].get("role") == Some(&serde_json::json!("admin"))
            })
            .returning(|_, rows| Ok(rows));
        let outcome = bootstrap(auth, data).ensure_admin(&credentials()).await;
        assert_eq!(outcome, BootstrapOutcome::Created(id));
    }

    #[tokio::test]
    async fn registered_principal_is_promoted_then_signed_out() {
        let id = PrincipalId::random();
        let mut seq = Sequence::new();
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(AuthError::already_registered()));
        auth.expect_sign_in()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(session(id)));
        auth.expect_sign_out()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let mut data = MockDataService::new();
        data.expect_select().times(2).returning(|_| Ok(Vec::new()));
        data.expect_insert().times(1).returning(|_, rows| Ok(rows));
        let outcome = bootstrap(auth, data).ensure_admin(&credentials()).await;
        assert_eq!(outcome, BootstrapOutcome::Promoted(id));
    }

    #[tokio::test]
    async fn promotion_failure_still_signs_out() {
        let id = PrincipalId::random();
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up()
            .returning(|_| Err(AuthError::already_registered()));
        auth.expect_sign_in().returning(move |_| Ok(session(id)));
        auth.expect_sign_out().times(1).returning(|_| Ok(()));
        let mut data = MockDataService::new();
        let mut calls = 0;
        data.expect_select().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(Vec::new())
            } else {
                Err(QueryError::forbidden("row policy"))
            }
        });
        let outcome = bootstrap(auth, data).ensure_admin(&credentials()).await;
        assert_eq!(outcome, BootstrapOutcome::Failed);
    }

    #[tokio::test]
    async fn insert_conflict_counts_as_present() {
        let id = PrincipalId::random();
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up()
            .returning(move |_| Ok(Principal { id, email: None }));
        let mut data = MockDataService::new();
        data.expect_select().returning(|_| Ok(Vec::new()));
        data.expect_insert()
            .returning(|_, _| Err(QueryError::conflict("user_roles_admin_key")));
        let outcome = bootstrap(auth, data).ensure_admin(&credentials()).await;
        assert_eq!(outcome, BootstrapOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn auth_outage_is_absorbed() {
        let mut auth = MockAuthGateway::new();
        auth.expect_sign_up()
            .returning(|_| Err(AuthError::unavailable("dns")));
        let mut data = MockDataService::new();
        data.expect_select().returning(|_| Ok(Vec::new()));
        let outcome = bootstrap(auth, data).ensure_admin(&credentials()).await;
        assert_eq!(outcome, BootstrapOutcome::Failed);
    }
}
