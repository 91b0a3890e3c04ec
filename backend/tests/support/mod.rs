//! Shared fixtures for integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::Key;
use async_trait::async_trait;
use chama::domain::ports::{
    AuthError, DataService, Query, QueryError, Row, RowFilter, SessionSource, Table,
};
use chama::domain::{
    AccountService, AdminService, AuthEvent, Credentials, MemberService, PaymentService,
    Principal, PrincipalId, RawSession, SessionResolver, SmsNotifier,
};
use chama::inbound::http::state::HttpState;
use chama::outbound::remote::MemoryRemote;
use mockable::{Clock, DefaultClock};
use tokio::sync::{Notify, Semaphore, broadcast};

pub fn clock() -> Arc<dyn Clock> {
    Arc::new(DefaultClock)
}

pub fn credentials(email: &str) -> Credentials {
    Credentials::try_from_parts(email, "secret1").expect("credentials")
}

pub fn raw_session(id: PrincipalId) -> RawSession {
    RawSession {
        access_token: format!("token-{id}"),
        refresh_token: None,
        expires_at: None,
        user: Principal { id, email: None },
    }
}

/// Handler state over `remote`, as the server wires it.
pub fn http_state(remote: &MemoryRemote) -> HttpState {
    let clock = clock();
    let data: Arc<dyn DataService> = Arc::new(remote.clone());
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
    HttpState::new(accounts, members, admin)
}

pub fn session_middleware() -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), Key::generate())
        .cookie_name("session".to_owned())
        .cookie_secure(false)
        .build()
}

pub fn admin_rows(remote: &MemoryRemote) -> usize {
    remote
        .rows(Table::UserRoles)
        .iter()
        .filter(|row| row.get("role").and_then(|v| v.as_str()) == Some("admin"))
        .count()
}

/// Data service counting every call it forwards.
pub struct CountingData {
    inner: Arc<dyn DataService>,
    calls: AtomicUsize,
}

impl CountingData {
    pub fn new(inner: Arc<dyn DataService>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DataService for CountingData {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, QueryError> {
        self.count();
        self.inner.select(query).await
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, QueryError> {
        self.count();
        self.inner.insert(table, rows).await
    }

    async fn update(
        &self,
        table: Table,
        filters: &[RowFilter],
        patch: Row,
    ) -> Result<Vec<Row>, QueryError> {
        self.count();
        self.inner.update(table, filters, patch).await
    }

    async fn delete(&self, table: Table, filters: &[RowFilter]) -> Result<usize, QueryError> {
        self.count();
        self.inner.delete(table, filters).await
    }
}

/// Data service whose role lookups wait for [`GatedData::release`].
pub struct GatedData {
    inner: Arc<dyn DataService>,
    gate: Semaphore,
    entered: Notify,
}

impl GatedData {
    pub fn new(inner: Arc<dyn DataService>) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
            entered: Notify::new(),
        }
    }

    /// Resolves once a role lookup is parked at the gate.
    pub async fn wait_for_lookup(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl DataService for GatedData {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, QueryError> {
        if query.table() == Table::UserRoles {
            self.entered.notify_one();
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| QueryError::unavailable("gate closed"))?;
            permit.forget();
        }
        self.inner.select(query).await
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, QueryError> {
        self.inner.insert(table, rows).await
    }

    async fn update(
        &self,
        table: Table,
        filters: &[RowFilter],
        patch: Row,
    ) -> Result<Vec<Row>, QueryError> {
        self.inner.update(table, filters, patch).await
    }

    async fn delete(&self, table: Table, filters: &[RowFilter]) -> Result<usize, QueryError> {
        self.inner.delete(table, filters).await
    }
}

/// Session source driven by the test: a fixed boot answer plus a channel of
/// pushed events.
pub struct ScriptedSource {
    boot: Option<RawSession>,
    hang: bool,
    events: broadcast::Sender<AuthEvent>,
}

impl ScriptedSource {
    pub fn with_boot(boot: Option<RawSession>) -> Self {
        let (events, _) = broadcast::channel(8);
        Self {
            boot,
            hang: false,
            events,
        }
    }

    /// A source whose boot fetch never completes.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::with_boot(None)
        }
    }

    pub fn push(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SessionSource for ScriptedSource {
    async fn current_session(&self) -> Result<Option<RawSession>, AuthError> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.boot.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

pub fn resolver(data: Arc<dyn DataService>) -> SessionResolver {
    SessionResolver::new(data, clock())
}
