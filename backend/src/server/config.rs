//! Application settings loaded via OrthoConfig, plus the assembled server
//! configuration.

use std::net::SocketAddr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use chama::domain::{Credentials, DEFAULT_PSEUDO_EMAIL_DOMAIN};
use chama::inbound::http::session_config::SessionSettings;
use chama::outbound::remote::RemoteConfig;
use zeroize::Zeroizing;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Settings read from `CHAMA_*` variables, config files and flags.
///
/// Without `remote_url` the server runs against an in-memory backend, which
/// is only useful for local development.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "CHAMA")]
pub struct AppSettings {
    /// Base URL of the hosted auth/data/function backend.
    pub remote_url: Option<String>,
    pub anon_key: Option<String>,
    pub service_key: Option<String>,
    /// Credentials of the administrator created on first start.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    /// How long readiness waits for the boot session fetch.
    #[ortho_config(default = 5000)]
    pub session_timeout_ms: u64,
    #[ortho_config(default = 10000)]
    pub request_timeout_ms: u64,
    #[ortho_config(default = String::from(DEFAULT_BIND_ADDR))]
    pub bind_addr: String,
    /// Domain for the synthetic email addresses of phone-only members.
    #[ortho_config(default = String::from(DEFAULT_PSEUDO_EMAIL_DOMAIN))]
    pub pseudo_email_domain: String,
}

/// Problems with the loaded settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid bind address '{value}': {source}")]
    BindAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("invalid remote URL '{value}': {reason}")]
    RemoteUrl { value: String, reason: String },
    #[error("{0} must be set when CHAMA_REMOTE_URL is set")]
    MissingKey(&'static str),
}

impl AppSettings {
    /// # Errors
    /// Fails when the bind address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.bind_addr
            .parse()
            .map_err(|source| SettingsError::BindAddr {
                value: self.bind_addr.clone(),
                source,
            })
    }

    #[must_use]
    pub fn boot_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn pseudo_email_domain(&self) -> &str {
        &self.pseudo_email_domain
    }

    /// Bootstrap credentials, when both parts are configured and well formed.
    #[must_use]
    pub fn admin_credentials(&self) -> Option<Credentials> {
        let (email, password) = (self.admin_email.as_deref()?, self.admin_password.as_deref()?);
        match Credentials::try_from_parts(email, password) {
            Ok(credentials) => Some(credentials),
            Err(error) => {
                tracing::warn!(%error, "ignoring malformed admin bootstrap credentials");
                None
            }
        }
    }

    /// Remote backend settings; `None` selects the in-memory backend.
    ///
    /// # Errors
    /// Fails when the URL does not parse or a key is missing.
    pub fn remote(&self) -> Result<Option<RemoteConfig>, SettingsError> {
        let Some(url) = self.remote_url.as_deref() else {
            return Ok(None);
        };
        let base_url = reqwest::Url::parse(url).map_err(|error| SettingsError::RemoteUrl {
            value: url.to_owned(),
            reason: error.to_string(),
        })?;
        let anon_key = self
            .anon_key
            .clone()
            .ok_or(SettingsError::MissingKey("CHAMA_ANON_KEY"))?;
        let service_key = self
            .service_key
            .clone()
            .ok_or(SettingsError::MissingKey("CHAMA_SERVICE_KEY"))?;
        Ok(Some(RemoteConfig {
            base_url,
            anon_key: Zeroizing::new(anon_key),
            service_key: Zeroizing::new(service_key),
            timeout: self.request_timeout(),
        }))
    }
}

/// Everything [`super::create_server`] needs besides the health state.
pub struct ServerConfig {
    pub(crate) settings: AppSettings,
    pub(crate) session: SessionSettings,
    pub(crate) bind_addr: SocketAddr,
}

impl ServerConfig {
    #[must_use]
    pub fn new(settings: AppSettings, session: SessionSettings, bind_addr: SocketAddr) -> Self {
        Self {
            settings,
            session,
            bind_addr,
        }
    }
}
