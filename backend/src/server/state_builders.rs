//! Builders wiring the outbound adapters into domain services.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use tracing::warn;

use chama::domain::ports::{AuthGateway, DataService, FunctionInvoker};
use chama::domain::{
    AccountService, AdminBootstrap, AdminService, MemberService, PaymentService, SessionContext,
    SessionTracker, SmsNotifier,
};
use chama::inbound::http::state::HttpState;
use chama::outbound::remote::{MemoryRemote, RemoteHttpClient};

use super::config::AppSettings;

/// Port implementations shared by every service.
#[derive(Clone)]
pub(crate) struct Ports {
    pub(crate) auth: Arc<dyn AuthGateway>,
    pub(crate) data: Arc<dyn DataService>,
    pub(crate) functions: Arc<dyn FunctionInvoker>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Ports {
    fn from_remote(client: RemoteHttpClient, clock: Arc<dyn Clock>) -> Self {
        let client = Arc::new(client);
        Self {
            auth: client.clone(),
            data: client.clone(),
            functions: client,
            clock,
        }
    }

    fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let remote = MemoryRemote::new(clock.clone());
        Self {
            auth: Arc::new(remote.clone()),
            data: Arc::new(remote.clone()),
            functions: Arc::new(remote),
            clock,
        }
    }
}

/// Select the remote adapter when configured, otherwise the in-memory one.
///
/// # Errors
/// Fails when the remote settings are invalid.
pub(crate) fn build_ports(settings: &AppSettings) -> std::io::Result<Ports> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let remote = settings.remote().map_err(std::io::Error::other)?;
    match remote {
        Some(config) => {
            let client = RemoteHttpClient::new(config, clock.clone())
                .map_err(std::io::Error::other)?;
            Ok(Ports::from_remote(client, clock))
        }
        None => {
            warn!("CHAMA_REMOTE_URL not set; using the in-memory backend (dev only)");
            Ok(Ports::in_memory(clock))
        }
    }
}

pub(crate) fn build_http_state(ports: &Ports, settings: &AppSettings) -> HttpState {
    let accounts = AccountService::new(
        ports.auth.clone(),
        ports.data.clone(),
        ports.clock.clone(),
        settings.pseudo_email_domain(),
    );
    let payments = PaymentService::new(ports.data.clone(), ports.functions.clone());
    let members = MemberService::new(ports.data.clone(), payments, ports.clock.clone());
    let admin = AdminService::new(
        ports.data.clone(),
        SmsNotifier::new(ports.functions.clone()),
        ports.clock.clone(),
    );
    HttpState::new(accounts, members, admin)
}

/// The instance's own session machinery: a tracker remembering the service
/// session and a context resolving it for readiness.
pub(crate) fn build_session(
    ports: &Ports,
    accounts: &AccountService,
    settings: &AppSettings,
) -> (Arc<SessionTracker>, Arc<SessionContext>) {
    let tracker = Arc::new(SessionTracker::new(ports.auth.clone(), ports.clock.clone()));
    let context = SessionContext::new(
        accounts.resolver().clone(),
        tracker.clone(),
        settings.boot_timeout(),
    );
    (tracker, context)
}

/// Bootstrap runs through the tracker so its sign-in and sign-out reach the
/// session context.
pub(crate) fn build_bootstrap(tracker: Arc<SessionTracker>, ports: &Ports) -> AdminBootstrap {
    AdminBootstrap::new(tracker, ports.data.clone())
}
