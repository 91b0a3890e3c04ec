//! Stateful wrapper around an [`AuthGateway`] that remembers the instance's
//! own session and publishes session-changed events, mirroring what a hosted
//! auth client library does for a single process.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, warn};

use super::ports::{AuthError, AuthGateway, SessionSource};
use super::{AuthEvent, AuthEventKind, Credentials, Principal, RawSession};

const EVENT_BUFFER: usize = 16;

pub struct SessionTracker {
    gateway: Arc<dyn AuthGateway>,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<RawSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SessionTracker {
    pub fn new(gateway: Arc<dyn AuthGateway>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            gateway,
            clock,
            current: Mutex::new(None),
            events,
        }
    }

    fn publish(&self, kind: AuthEventKind, session: Option<RawSession>) {
        if self.events.send(AuthEvent::new(kind, session)).is_err() {
            debug!(?kind, "no session listeners");
        }
    }
}

#[async_trait]
impl AuthGateway for SessionTracker {
    async fn sign_up(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        self.gateway.sign_up(credentials).await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<RawSession, AuthError> {
        let session = self.gateway.sign_in(credentials).await?;
        *self.current.lock().await = Some(session.clone());
        self.publish(AuthEventKind::SignedIn, Some(session.clone()));
        Ok(session)
    }

    /// Local state is cleared even when the remote revocation fails.
    async fn sign_out(&self, session: &RawSession) -> Result<(), AuthError> {
        let result = self.gateway.sign_out(session).await;
        let mut current = self.current.lock().await;
        if current.as_ref().is_some_and(|held| held.user.id == session.user.id) {
            *current = None;
            drop(current);
            self.publish(AuthEventKind::SignedOut, None);
        }
        result
    }

    async fn refresh(&self, session: &RawSession) -> Result<RawSession, AuthError> {
        let fresh = self.gateway.refresh(session).await?;
        *self.current.lock().await = Some(fresh.clone());
        self.publish(AuthEventKind::TokenRefreshed, Some(fresh.clone()));
        Ok(fresh)
    }
}

#[async_trait]
impl SessionSource for SessionTracker {
    /// Held session, refreshed first when its access token has expired. A
    /// failed refresh drops the session and signals sign-out.
    async fn current_session(&self) -> Result<Option<RawSession>, AuthError> {
        let held = self.current.lock().await.clone();
        let Some(session) = held else {
            return Ok(None);
        };
        if !session.is_expired_at(self.clock.utc()) {
            return Ok(Some(session));
        }
        match self.refresh(&session).await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(error) => {
                warn!(user_id = %session.user.id, %error, "session refresh failed");
                *self.current.lock().await = None;
                self.publish(AuthEventKind::SignedOut, None);
                Err(error)
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
