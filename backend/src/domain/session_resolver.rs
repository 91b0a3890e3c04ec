//! Classifies a raw session as anonymous, member or admin.

use std::sync::Arc;

use mockable::Clock;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::ports::{DataService, Query, QueryError, Row, RowFilter, Table};
use super::{PrincipalId, RawSession, ResolvedSession, Role};

/// Resolves sessions against `user_roles` and records presence on `profiles`.
#[derive(Clone)]
pub struct SessionResolver {
    data: Arc<dyn DataService>,
    clock: Arc<dyn Clock>,
}

impl SessionResolver {
    pub fn new(data: Arc<dyn DataService>, clock: Arc<dyn Clock>) -> Self {
        Self { data, clock }
    }

    /// Resolve `raw` to `{principal, isAdmin}`.
    ///
    /// `None` resolves to anonymous without touching the store. Otherwise one
    /// role lookup and one presence update run concurrently. A failed lookup
    /// classifies the principal as a member; a failed presence update is only
    /// logged.
    pub async fn resolve(&self, raw: Option<&RawSession>) -> ResolvedSession {
        let Some(session) = raw else {
            return ResolvedSession::anonymous();
        };
        let principal = session.user.clone();
        let (is_admin, touched) = tokio::join!(
            self.has_admin_role(principal.id),
            self.touch_presence(principal.id)
        );
        if let Err(error) = touched {
            warn!(user_id = %principal.id, %error, "presence update failed");
        }
        match is_admin {
            Ok(true) => ResolvedSession::admin(principal),
            Ok(false) => ResolvedSession::member(principal),
            Err(error) => {
                warn!(user_id = %principal.id, %error, "role lookup failed; treating as member");
                ResolvedSession::member(principal)
            }
        }
    }

    async fn has_admin_role(&self, user_id: PrincipalId) -> Result<bool, QueryError> {
        let query = Query::from(Table::UserRoles)
            .filter(RowFilter::eq("user_id", user_id))
            .filter(RowFilter::eq("role", Role::Admin.as_str()))
            .limit(1);
        let rows = self.data.select(&query).await?;
        debug!(user_id = %user_id, admin = !rows.is_empty(), "role lookup");
        Ok(!rows.is_empty())
    }

    async fn touch_presence(&self, user_id: PrincipalId) -> Result<(), QueryError> {
        let mut patch = Row::new();
        patch.insert("is_online".to_owned(), Value::Bool(true));
        patch.insert("last_seen".to_owned(), json!(self.clock.utc()));
        self.data
            .update(
                Table::Profiles,
                &[RowFilter::eq("user_id", user_id)],
                patch,
            )
            .await
            .map(drop)
    }
}
