//! In-process stand-in for the hosted backend.
//!
//! Used for local development without credentials and by integration tests.
//! It enforces the same uniqueness rules the hosted schema does: one profile
//! per user, one row per `(user_id, role)` and a single `admin` role row.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Duration;
use mockable::Clock;
use serde_json::{Value, json};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::domain::ports::{
    AuthError, AuthGateway, DataService, FunctionInvoker, FunctionName, InvokeError, Order,
    Query, QueryError, Row, RowFilter, Table,
};
use crate::domain::{Credentials, Principal, PrincipalId, RawSession};

const SESSION_TTL_SECS: i64 = 3600;

struct Account {
    id: PrincipalId,
    password: Zeroizing<String>,
}

#[derive(Default)]
struct State {
    offline: bool,
    accounts: HashMap<String, Account>,
    access_tokens: HashMap<String, PrincipalId>,
    refresh_tokens: HashMap<String, PrincipalId>,
    tables: BTreeMap<Table, Vec<Row>>,
    calls: Vec<(FunctionName, Value)>,
    failing: Vec<FunctionName>,
}

impl State {
    fn email_of(&self, id: PrincipalId) -> Option<String> {
        self.accounts
            .iter()
            .find(|(_, account)| account.id == id)
            .map(|(email, _)| email.clone())
    }

    fn issue(&mut self, id: PrincipalId, clock: &dyn Clock) -> RawSession {
        let access = Uuid::new_v4().to_string();
        let refresh = Uuid::new_v4().to_string();
        self.access_tokens.insert(access.clone(), id);
        self.refresh_tokens.insert(refresh.clone(), id);
        RawSession {
            access_token: access,
            refresh_token: Some(refresh),
            expires_at: Duration::try_seconds(SESSION_TTL_SECS).map(|ttl| clock.utc() + ttl),
            user: Principal {
                id,
                email: self.email_of(id),
            },
        }
    }
}

/// Auth, data and function host kept in memory.
#[derive(Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRemote {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every call fail as unreachable until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Make `name` answer with a failure status.
    pub fn fail_function(&self, name: FunctionName) {
        self.lock().failing.push(name);
    }

    /// Snapshot of `table`.
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.lock().tables.get(&table).cloned().unwrap_or_default()
    }

    /// Function invocations in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<(FunctionName, Value)> {
        self.lock().calls.clone()
    }

    /// Number of access tokens not yet signed out.
    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.lock().access_tokens.len()
    }
}

#[async_trait]
impl AuthGateway for MemoryRemote {
    async fn sign_up(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        let mut state = self.lock();
        if state.offline {
            return Err(AuthError::unavailable("offline"));
        }
        if state.accounts.contains_key(credentials.email()) {
            return Err(AuthError::already_registered());
        }
        let id = PrincipalId::random();
        state.accounts.insert(
            credentials.email().to_owned(),
            Account {
                id,
                password: Zeroizing::new(credentials.password().to_owned()),
            },
        );
        Ok(Principal {
            id,
            email: Some(credentials.email().to_owned()),
        })
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<RawSession, AuthError> {
        let mut state = self.lock();
        if state.offline {
            return Err(AuthError::unavailable("offline"));
        }
        let id = match state.accounts.get(credentials.email()) {
            Some(account) if account.password.as_str() == credentials.password() => account.id,
            _ => return Err(AuthError::invalid_credentials()),
        };
        Ok(state.issue(id, &*self.clock))
    }

    async fn sign_out(&self, session: &RawSession) -> Result<(), AuthError> {
        let mut state = self.lock();
        if state.offline {
            return Err(AuthError::unavailable("offline"));
        }
        state.access_tokens.remove(&session.access_token);
        if let Some(refresh) = &session.refresh_token {
            state.refresh_tokens.remove(refresh);
        }
        Ok(())
    }

    async fn refresh(&self, session: &RawSession) -> Result<RawSession, AuthError> {
        let mut state = self.lock();
        if state.offline {
            return Err(AuthError::unavailable("offline"));
        }
        let id = session
            .refresh_token
            .as_ref()
            .and_then(|token| state.refresh_tokens.remove(token))
            .ok_or_else(AuthError::session_expired)?;
        state.access_tokens.remove(&session.access_token);
        Ok(state.issue(id, &*self.clock))
    }
}

fn matches_all(filters: &[RowFilter], row: &Row) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

fn compare(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        // Nulls sort last ascending, as in Postgres.
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

fn same(column: &str, a: &Row, b: &Row) -> bool {
    matches!((a.get(column), b.get(column)), (Some(x), Some(y)) if !x.is_null() && x == y)
}

/// Uniqueness rules of the hosted schema.
fn violates_unique(table: Table, existing: &[Row], candidate: &Row) -> Option<&'static str> {
    existing.iter().find_map(|row| match table {
        Table::Profiles if same("user_id", row, candidate) => Some("profiles_user_id_key"),
        Table::UserRoles if same("role", row, candidate) && same("user_id", row, candidate) => {
            Some("user_roles_user_id_role_key")
        }
        Table::UserRoles
            if candidate.get("role").and_then(Value::as_str) == Some("admin")
                && same("role", row, candidate) =>
        {
            Some("user_roles_single_admin")
        }
        _ if same("id", row, candidate) => Some("primary key"),
        _ => None,
    })
}

#[async_trait]
impl DataService for MemoryRemote {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, QueryError> {
        let state = self.lock();
        if state.offline {
            return Err(QueryError::unavailable("offline"));
        }
        let mut rows: Vec<Row> = state
            .tables
            .get(&query.table())
            .into_iter()
            .flatten()
            .filter(|row| matches_all(query.filters(), row))
            .cloned()
            .collect();
        if let Some((column, order)) = query.ordering() {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(column), b.get(column));
                match order {
                    Order::Ascending => ordering,
                    Order::Descending => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = query.row_limit() {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, QueryError> {
        let now = self.clock.utc();
        let mut state = self.lock();
        if state.offline {
            return Err(QueryError::unavailable("offline"));
        }
        let stored = state.tables.entry(table).or_default();
        let mut accepted: Vec<Row> = Vec::with_capacity(rows.len());
        for mut row in rows {
            row.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
            row.entry("created_at").or_insert_with(|| json!(now));
            let seen = stored.iter().chain(accepted.iter()).cloned().collect::<Vec<_>>();
            if let Some(constraint) = violates_unique(table, &seen, &row) {
                return Err(QueryError::conflict(format!(
                    "duplicate key value violates unique constraint \"{constraint}\""
                )));
            }
            accepted.push(row);
        }
        stored.extend(accepted.iter().cloned());
        Ok(accepted)
    }

    async fn update(
        &self,
        table: Table,
        filters: &[RowFilter],
        patch: Row,
    ) -> Result<Vec<Row>, QueryError> {
        let mut state = self.lock();
        if state.offline {
            return Err(QueryError::unavailable("offline"));
        }
        let Some(stored) = state.tables.get_mut(&table) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::new();
        for row in stored.iter_mut().filter(|row| matches_all(filters, row)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: Table, filters: &[RowFilter]) -> Result<usize, QueryError> {
        if filters.is_empty() {
            return Err(QueryError::rejected("refusing unfiltered delete"));
        }
        let mut state = self.lock();
        if state.offline {
            return Err(QueryError::unavailable("offline"));
        }
        let Some(stored) = state.tables.get_mut(&table) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|row| !matches_all(filters, row));
        Ok(before - stored.len())
    }
}

#[async_trait]
impl FunctionInvoker for MemoryRemote {
    async fn invoke(&self, name: FunctionName, body: Value) -> Result<Value, InvokeError> {
        let mut state = self.lock();
        if state.offline {
            return Err(InvokeError::unavailable("offline"));
        }
        state.calls.push((name, body));
        if state.failing.contains(&name) {
            return Err(InvokeError::failed(502_u16, "function reported failure"));
        }
        let reply = match name {
            FunctionName::SendSms => json!({ "success": true }),
            FunctionName::InitiatePayment => {
                let reference = Uuid::new_v4();
                json!({
                    "success": true,
                    "reference": reference,
                    "redirectUrl": format!("https://pay.invalid/checkout/{reference}"),
                })
            }
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockable::DefaultClock;
    use rstest::{fixture, rstest};

    #[fixture]
    fn remote() -> MemoryRemote {
        MemoryRemote::new(Arc::new(DefaultClock))
    }

    fn row(value: Value) -> Row {
        serde_json::from_value(value).expect("object row")
    }

    fn role_row(user: &str, role: &str) -> Row {
        row(json!({ "user_id": user, "role": role }))
    }

    fn credentials() -> Credentials {
        Credentials::try_from_parts("admin@example.org", "secret1").expect("credentials")
    }

    #[rstest]
    #[tokio::test]
    async fn second_admin_role_conflicts(remote: MemoryRemote) {
        remote
            .insert(Table::UserRoles, vec![role_row("a", "admin")])
            .await
            .expect("first admin");
        let err = remote
            .insert(Table::UserRoles, vec![role_row("b", "admin")])
            .await
            .expect_err("second admin");
        assert!(matches!(err, QueryError::Conflict { .. }));
        assert_eq!(remote.rows(Table::UserRoles).len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn select_orders_and_limits(remote: MemoryRemote) {
        let rows = ["2024-01-02", "2024-01-03", "2024-01-01"]
            .into_iter()
            .map(|date| row(json!({ "user_id": "u", "contribution_date": date })))
            .collect();
        remote
            .insert(Table::Contributions, rows)
            .await
            .expect("insert");
        let newest = remote
            .select(
                &Query::from(Table::Contributions)
                    .filter(RowFilter::eq("user_id", "u"))
                    .order_by("contribution_date", Order::Descending)
                    .limit(2),
            )
            .await
            .expect("select");
        let dates: Vec<_> = newest
            .iter()
            .filter_map(|row| row.get("contribution_date").and_then(Value::as_str))
            .collect();
        assert_eq!(dates, ["2024-01-03", "2024-01-02"]);
    }

    #[rstest]
    #[tokio::test]
    async fn decimal_columns_sort_numerically(remote: MemoryRemote) {
        let rows = [json!(9.5), json!(10.25), json!(2)]
            .into_iter()
            .map(|amount| row(json!({ "user_id": "u", "amount": amount })))
            .collect();
        remote
            .insert(Table::Contributions, rows)
            .await
            .expect("insert");
        let sorted = remote
            .select(&Query::from(Table::Contributions).order_by("amount", Order::Ascending))
            .await
            .expect("select");
        let amounts: Vec<_> = sorted
            .iter()
            .filter_map(|row| row.get("amount").and_then(Value::as_f64))
            .collect();
        assert_eq!(amounts, [2.0, 9.5, 10.25]);
    }

    #[rstest]
    #[tokio::test]
    async fn refresh_rotates_tokens(remote: MemoryRemote) {
        remote.sign_up(&credentials()).await.expect("sign up");
        let first = remote.sign_in(&credentials()).await.expect("sign in");
        let second = remote.refresh(&first).await.expect("refresh");
        assert_ne!(first.access_token, second.access_token);
        assert_eq!(
            remote.refresh(&first).await.expect_err("reused"),
            AuthError::SessionExpired
        );
        assert_eq!(remote.live_sessions(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn offline_remote_is_unavailable(remote: MemoryRemote) {
        remote.set_offline(true);
        let err = remote
            .select(&Query::from(Table::Profiles))
            .await
            .expect_err("offline");
        assert!(matches!(err, QueryError::Unavailable { .. }));
    }
}
