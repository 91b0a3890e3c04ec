//! Per-instance session state machine.
//!
//! ```text
//! Initializing -> Anonymous | Member | Admin
//! Anonymous | Member | Admin -> Anonymous | Member | Admin
//! ```
//!
//! Every transition goes through [`SessionContext::admit`], which hands out a
//! generation ticket synchronously, followed by a commit that is dropped when
//! a newer ticket has been issued or the context was torn down. A slow role
//! lookup for an older event can therefore never overwrite a later sign-out.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ports::SessionSource;
use super::{AuthEvent, AuthEventKind, RawSession, ResolvedSession, SessionPhase, SessionResolver};

/// Default bound on the boot-time session fetch.
pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(5);

/// An admitted event waiting for its resolution to be committed.
#[derive(Debug)]
pub struct Admitted {
    generation: u64,
    work: Work,
}

#[derive(Debug)]
enum Work {
    Clear,
    Resolve(Option<RawSession>),
}

impl Admitted {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct SessionContext {
    resolver: SessionResolver,
    source: Arc<dyn SessionSource>,
    boot_timeout: Duration,
    state: watch::Sender<SessionPhase>,
    generation: AtomicU64,
    live: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionContext {
    pub fn new(
        resolver: SessionResolver,
        source: Arc<dyn SessionSource>,
        boot_timeout: Duration,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SessionPhase::Initializing);
        Arc::new(Self {
            resolver,
            source,
            boot_timeout,
            state,
            generation: AtomicU64::new(0),
            live: AtomicBool::new(true),
            listener: Mutex::new(None),
        })
    }

    /// Subscribe to change notifications, then resolve the boot session.
    ///
    /// The subscription is taken before the boot fetch so no event is lost.
    /// A fetch that errors or outlives the boot timeout resolves anonymous.
    pub async fn init(self: &Arc<Self>) {
        let events = self.source.subscribe();
        let listener = tokio::spawn(Self::listen(Arc::downgrade(self), events));
        if let Some(previous) = self.lock_listener().replace(listener) {
            previous.abort();
        }

        let boot = self.next_generation();
        let fetch = tokio::time::timeout(self.boot_timeout, self.source.current_session());
        let session = match fetch.await {
            Ok(Ok(session)) => session,
            Ok(Err(error)) => {
                warn!(%error, "boot session fetch failed; continuing anonymous");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.boot_timeout.as_millis(),
                    "boot session fetch timed out; continuing anonymous"
                );
                None
            }
        };
        self.settle(Admitted {
            generation: boot,
            work: Work::Resolve(session),
        })
        .await;
    }

    /// Admit `event` and resolve it. The ticket is taken before the returned
    /// future is first polled.
    pub fn update(&self, event: AuthEvent) -> impl Future<Output = ()> + Send + '_ {
        let admitted = self.admit(event);
        self.settle(admitted)
    }

    /// Stop listening and refuse further commits.
    pub fn teardown(&self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(listener) = self.lock_listener().take() {
            listener.abort();
        }
        debug!("session context torn down");
    }

    /// Issue a generation ticket for `event`.
    pub fn admit(&self, event: AuthEvent) -> Admitted {
        let generation = self.next_generation();
        debug!(kind = ?event.kind, generation, "session event admitted");
        let work = match event.kind {
            AuthEventKind::SignedOut => Work::Clear,
            AuthEventKind::SignedIn
            | AuthEventKind::TokenRefreshed
            | AuthEventKind::UserUpdated
            | AuthEventKind::Other => Work::Resolve(event.session),
        };
        Admitted { generation, work }
    }

    /// Resolve an admitted event and commit it unless superseded.
    pub async fn settle(&self, admitted: Admitted) {
        let resolved = match admitted.work {
            Work::Clear => ResolvedSession::anonymous(),
            Work::Resolve(session) => self.resolver.resolve(session.as_ref()).await,
        };
        self.apply(admitted.generation, resolved);
    }

    /// Commit `resolved` when `generation` is still the newest ticket and the
    /// context is live. Returns whether the state was written.
    pub fn apply(&self, generation: u64, resolved: ResolvedSession) -> bool {
        let next = SessionPhase::from(resolved);
        let mut committed = false;
        self.state.send_if_modified(|phase| {
            if !self.live.load(Ordering::SeqCst)
                || self.generation.load(Ordering::SeqCst) != generation
            {
                return false;
            }
            committed = true;
            if *phase == next {
                return false;
            }
            info!(from = phase.label(), to = next.label(), generation, "session phase changed");
            *phase = next;
            true
        });
        if !committed {
            debug!(generation, "superseded session resolution dropped");
        }
        committed
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.borrow().clone()
    }

    /// Resolved session, or `None` while initializing.
    #[must_use]
    pub fn current(&self) -> Option<ResolvedSession> {
        self.state.borrow().resolved()
    }

    pub fn watch(&self) -> watch::Receiver<SessionPhase> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    async fn listen(context: Weak<Self>, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Some(strong) = context.upgrade() else {
                        break;
                    };
                    let admitted = strong.admit(event);
                    tokio::spawn(async move { strong.settle(admitted).await });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session events dropped; awaiting next event");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("session event stream closed");
                    break;
                }
            }
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock_listener(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.listener.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        if let Some(listener) = self.lock_listener().take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockDataService, MockSessionSource, Row};
    use crate::domain::{Principal, PrincipalId};
    use mockable::DefaultClock;

    fn raw(id: PrincipalId) -> RawSession {
        RawSession {
            access_token: "token".to_owned(),
            refresh_token: None,
            expires_at: None,
            user: Principal { id, email: None },
        }
    }

    fn member_data() -> MockDataService {
        let mut data = MockDataService::new();
        data.expect_select().returning(|_| Ok(Vec::new()));
        data.expect_update().returning(|_, _, _| Ok(Vec::<Row>::new()));
        data
    }

    fn context(source: MockSessionSource, data: MockDataService) -> Arc<SessionContext> {
        let resolver = SessionResolver::new(Arc::new(data), Arc::new(DefaultClock));
        SessionContext::new(resolver, Arc::new(source), DEFAULT_BOOT_TIMEOUT)
    }

    fn quiet_source(session: Option<RawSession>) -> (MockSessionSource, broadcast::Sender<AuthEvent>) {
        let (events, _) = broadcast::channel(8);
        let mut source = MockSessionSource::new();
        let feed = events.clone();
        source.expect_subscribe().returning(move || feed.subscribe());
        source
            .expect_current_session()
            .returning(move || Ok(session.clone()));
        (source, events)
    }

    #[tokio::test]
    async fn starts_initializing_and_boots_anonymous() {
        let (source, _events) = quiet_source(None);
        let ctx = context(source, MockDataService::new());
        assert!(ctx.phase().is_initializing());
        ctx.init().await;
        assert_eq!(ctx.phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn boots_member_from_existing_session() {
        let id = PrincipalId::random();
        let (source, _events) = quiet_source(Some(raw(id)));
        let ctx = context(source, member_data());
        ctx.init().await;
        assert!(matches!(ctx.phase(), SessionPhase::Member(p) if p.id == id));
    }

    #[tokio::test]
    async fn boot_fetch_error_fails_closed() {
        let (events, _) = broadcast::channel(1);
        let mut source = MockSessionSource::new();
        source.expect_subscribe().returning(move || events.subscribe());
        source
            .expect_current_session()
            .returning(|| Err(crate::domain::ports::AuthError::unavailable("down")));
        let ctx = context(source, MockDataService::new());
        ctx.init().await;
        assert_eq!(ctx.current(), Some(ResolvedSession::anonymous()));
    }

    #[tokio::test]
    async fn sign_out_clears_without_lookup() {
        let id = PrincipalId::random();
        let (source, _events) = quiet_source(Some(raw(id)));
        let ctx = context(source, member_data());
        ctx.init().await;
        ctx.update(AuthEvent::signed_out()).await;
        assert_eq!(ctx.phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn superseded_ticket_is_not_committed() {
        let (source, _events) = quiet_source(None);
        let ctx = context(source, MockDataService::new());
        let id = PrincipalId::random();
        let first = ctx.admit(AuthEvent::new(AuthEventKind::SignedIn, Some(raw(id))));
        let second = ctx.admit(AuthEvent::signed_out());
        ctx.settle(second).await;
        assert!(!ctx.apply(first.generation(), ResolvedSession::admin(raw(id).user)));
        assert_eq!(ctx.phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn teardown_refuses_commits() {
        let (source, _events) = quiet_source(None);
        let ctx = context(source, MockDataService::new());
        ctx.init().await;
        ctx.teardown();
        let admitted = ctx.admit(AuthEvent::new(AuthEventKind::Other, None));
        let generation = admitted.generation();
        assert!(!ctx.apply(generation, ResolvedSession::member(raw(PrincipalId::random()).user)));
        assert!(!ctx.is_live());
    }

    #[tokio::test]
    async fn pushed_events_drive_transitions() {
        let id = PrincipalId::random();
        let (source, events) = quiet_source(None);
        let ctx = context(source, member_data());
        ctx.init().await;
        let mut phases = ctx.watch();
        events
            .send(AuthEvent::new(AuthEventKind::SignedIn, Some(raw(id))))
            .expect("listener subscribed");
        phases.changed().await.expect("phase change");
        assert!(matches!(&*phases.borrow(), SessionPhase::Member(p) if p.id == id));
    }
}
