//! Cookie session settings read from the environment.
//!
//! | Variable                  | Meaning                                   |
//! |---------------------------|-------------------------------------------|
//! | `SESSION_KEY_FILE`        | path to at least 64 bytes of key material |
//! | `SESSION_COOKIE_SECURE`   | mark the cookie `Secure`                  |
//! | `SESSION_SAMESITE`        | `Strict`, `Lax` or `None`                 |
//! | `SESSION_ALLOW_EPHEMERAL` | permit a generated key when none is found |
//!
//! Debug builds fall back to defaults with a warning; release builds refuse
//! to start on anything missing or malformed.

use std::path::PathBuf;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Key, SameSite};
use mockable::Env;
use tracing::warn;
use zeroize::Zeroizing;

pub const KEY_FILE_ENV: &str = "SESSION_KEY_FILE";
pub const COOKIE_SECURE_ENV: &str = "SESSION_COOKIE_SECURE";
pub const SAMESITE_ENV: &str = "SESSION_SAMESITE";
pub const ALLOW_EPHEMERAL_ENV: &str = "SESSION_ALLOW_EPHEMERAL";

const DEFAULT_KEY_PATH: &str = "/var/run/secrets/chama_session_key";
const KEY_MIN_LEN: usize = 64;
const COOKIE_NAME: &str = "session";
const BOOL_EXPECTED: &str = "1|0|true|false|yes|no";
const SAMESITE_EXPECTED: &str = "Strict|Lax|None";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    Debug,
    Release,
}

impl BuildMode {
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },
    #[error("{name}='{value}' is not one of {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("cannot read session key {path}: {source}")]
    KeyUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session key {path} holds {length} bytes; at least 64 are required")]
    KeyTooShort { path: PathBuf, length: usize },
    #[error("SameSite=None needs a Secure cookie")]
    InsecureSameSiteNone,
    #[error("SESSION_ALLOW_EPHEMERAL may not be enabled in release builds")]
    EphemeralInRelease,
}

/// Validated cookie session settings.
#[derive(Clone)]
pub struct SessionSettings {
    pub key: Key,
    pub cookie_secure: bool,
    pub same_site: SameSite,
}

impl SessionSettings {
    /// Encrypted cookie session middleware carrying these settings.
    #[must_use]
    pub fn middleware(&self) -> SessionMiddleware<CookieSessionStore> {
        SessionMiddleware::builder(CookieSessionStore::default(), self.key.clone())
            .cookie_name(COOKIE_NAME.to_owned())
            .cookie_path("/".to_owned())
            .cookie_secure(self.cookie_secure)
            .cookie_http_only(true)
            .cookie_same_site(self.same_site)
            .build()
    }
}

/// Release builds turn `error` into a failure; debug builds warn and use
/// `fallback`.
fn lenient<T>(mode: BuildMode, fallback: T, error: SessionConfigError) -> Result<T, SessionConfigError> {
    match mode {
        BuildMode::Debug => {
            warn!(%error, "using development default");
            Ok(fallback)
        }
        BuildMode::Release => Err(error),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn bool_var(
    env: &impl Env,
    mode: BuildMode,
    name: &'static str,
    fallback: bool,
) -> Result<bool, SessionConfigError> {
    let Some(value) = env.string(name) else {
        return lenient(mode, fallback, SessionConfigError::Missing { name });
    };
    match parse_bool(&value) {
        Some(flag) => Ok(flag),
        None => lenient(
            mode,
            fallback,
            SessionConfigError::Invalid {
                name,
                value,
                expected: BOOL_EXPECTED,
            },
        ),
    }
}

fn same_site_var(
    env: &impl Env,
    mode: BuildMode,
    cookie_secure: bool,
) -> Result<SameSite, SessionConfigError> {
    let fallback = match mode {
        BuildMode::Debug => SameSite::Lax,
        BuildMode::Release => SameSite::Strict,
    };
    let Some(value) = env.string(SAMESITE_ENV) else {
        return lenient(mode, fallback, SessionConfigError::Missing { name: SAMESITE_ENV });
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" if cookie_secure => Ok(SameSite::None),
        "none" => lenient(mode, SameSite::None, SessionConfigError::InsecureSameSiteNone),
        _ => lenient(
            mode,
            fallback,
            SessionConfigError::Invalid {
                name: SAMESITE_ENV,
                value,
                expected: SAMESITE_EXPECTED,
            },
        ),
    }
}

fn session_key(
    env: &impl Env,
    mode: BuildMode,
    allow_ephemeral: bool,
) -> Result<Key, SessionConfigError> {
    let path = PathBuf::from(
        env.string(KEY_FILE_ENV)
            .unwrap_or_else(|| DEFAULT_KEY_PATH.to_owned()),
    );
    match std::fs::read(&path).map(Zeroizing::new) {
        Ok(bytes) if bytes.len() >= KEY_MIN_LEN => Ok(Key::derive_from(&bytes)),
        Ok(bytes) => lenient(
            mode,
            Key::generate(),
            SessionConfigError::KeyTooShort {
                path,
                length: bytes.len(),
            },
        ),
        Err(source) if allow_ephemeral => {
            warn!(path = %path.display(), %source, "session key missing; generated a temporary one");
            Ok(Key::generate())
        }
        Err(source) => lenient(
            mode,
            Key::generate(),
            SessionConfigError::KeyUnreadable { path, source },
        ),
    }
}

/// Read and validate the session settings.
///
/// # Errors
/// Release builds fail on a missing or malformed variable, a short or
/// unreadable key, an insecure `SameSite=None` or an ephemeral-key opt-in.
pub fn session_settings_from_env(
    env: &impl Env,
    mode: BuildMode,
) -> Result<SessionSettings, SessionConfigError> {
    let cookie_secure = bool_var(env, mode, COOKIE_SECURE_ENV, true)?;
    let same_site = same_site_var(env, mode, cookie_secure)?;
    let allow_ephemeral = bool_var(env, mode, ALLOW_EPHEMERAL_ENV, false)?;
    if allow_ephemeral && mode == BuildMode::Release {
        return Err(SessionConfigError::EphemeralInRelease);
    }
    let key = session_key(env, mode, allow_ephemeral)?;
    Ok(SessionSettings {
        key,
        cookie_secure,
        same_site,
    })
}
