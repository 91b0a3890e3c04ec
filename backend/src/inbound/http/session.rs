//! Cookie storage for the hosted-auth session.
//!
//! The raw session (tokens plus principal) is kept in the private, encrypted
//! session cookie so requests never carry tokens in readable form.

use actix_session::Session;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{Error, RawSession};

pub(crate) const RAW_SESSION_KEY: &str = "auth";

/// Handler-facing wrapper around the actix session.
#[derive(Clone)]
pub struct SessionCookie(Session);

impl SessionCookie {
    pub fn new(session: Session) -> Self {
        Self(session)
    }

    /// Store `session`, rotating the cookie identity.
    pub fn persist(&self, session: &RawSession) -> Result<(), Error> {
        self.0.renew();
        self.0
            .insert(RAW_SESSION_KEY, session)
            .map_err(|error| Error::internal(format!("failed to persist session: {error}")))
    }

    /// The stored session, if any. An unreadable cookie counts as absent.
    pub fn raw(&self) -> Option<RawSession> {
        match self.0.get::<RawSession>(RAW_SESSION_KEY) {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "discarding unreadable session cookie");
                self.0.remove(RAW_SESSION_KEY);
                None
            }
        }
    }

    pub fn clear(&self) {
        self.0.purge();
    }
}

impl FromRequest for SessionCookie {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let fut = Session::from_request(req, payload);
        Box::pin(async move { fut.await.map(SessionCookie::new) })
    }
}
