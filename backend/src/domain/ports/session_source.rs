//! Driven port exposing the instance's current session and its change feed.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::{AuthEvent, RawSession};

use super::AuthError;

/// `getCurrentSession` plus `onSessionChanged`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Session currently held by this instance, if any. May hit the network.
    async fn current_session(&self) -> Result<Option<RawSession>, AuthError>;

    /// Subscribe to session-changed notifications.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
