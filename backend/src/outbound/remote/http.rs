//! Reqwest-backed adapter for the hosted backend.
//!
//! One client serves the auth endpoints (`/auth/v1`), the REST endpoints
//! (`/rest/v1/<table>`) and the function endpoints (`/functions/v1/<name>`).
//! Auth calls carry the public anon key; data and function calls carry the
//! service key, so row policies are bypassed and access control rests with
//! the authorization gate in front of every route.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use zeroize::Zeroizing;

use super::dto::{
    AuthErrorDto, PasswordGrantDto, RefreshGrantDto, RestErrorDto, SessionDto, SignUpDto,
};
use crate::domain::ports::{
    AuthError, AuthGateway, DataService, FunctionInvoker, FunctionName, InvokeError, Order,
    Query, QueryError, Row, RowFilter, Table,
};
use crate::domain::{Credentials, Principal, RawSession};

/// Connection settings for the hosted backend.
#[derive(Clone)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub anon_key: Zeroizing<String>,
    pub service_key: Zeroizing<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Failures while building the adapter.
#[derive(Debug, thiserror::Error)]
pub enum RemoteSetupError {
    #[error("remote key is not a valid header value")]
    InvalidKey,
    #[error("remote base URL cannot be used as a base: {0}")]
    InvalidBaseUrl(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub struct RemoteHttpClient {
    client: Client,
    base_url: Url,
    anon_key: HeaderValue,
    service_key: Zeroizing<String>,
    clock: Arc<dyn Clock>,
}

impl RemoteHttpClient {
    /// Build the adapter with a request timeout applied to every call.
    ///
    /// # Errors
    ///
    /// Fails when a key is not header-safe, the URL cannot carry paths, or the
    /// reqwest client cannot be constructed.
    pub fn new(config: RemoteConfig, clock: Arc<dyn Clock>) -> Result<Self, RemoteSetupError> {
        if config.base_url.cannot_be_a_base() {
            return Err(RemoteSetupError::InvalidBaseUrl(config.base_url.to_string()));
        }
        let mut anon_key =
            HeaderValue::from_str(&config.anon_key).map_err(|_| RemoteSetupError::InvalidKey)?;
        anon_key.set_sensitive(true);
        HeaderValue::from_str(&bearer(&config.service_key))
            .map_err(|_| RemoteSetupError::InvalidKey)?;

        let mut defaults = HeaderMap::new();
        defaults.insert("apikey", anon_key.clone());
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(defaults)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url,
            anon_key,
            service_key: config.service_key,
            clock,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn with_service_key(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.service_key.as_str())
            .header(AUTHORIZATION, bearer(&self.service_key))
    }

    async fn password_grant(&self, credentials: &Credentials) -> Result<SessionDto, AuthError> {
        let mut url = self.endpoint(&["auth", "v1", "token"]);
        url.query_pairs_mut().append_pair("grant_type", "password");
        let response = self
            .client
            .post(url)
            .json(&PasswordGrantDto {
                email: credentials.email(),
                password: credentials.password(),
            })
            .send()
            .await
            .map_err(auth_transport_error)?;
        auth_json(response).await
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[async_trait]
impl AuthGateway for RemoteHttpClient {
    async fn sign_up(&self, credentials: &Credentials) -> Result<Principal, AuthError> {
        let response = self
            .client
            .post(self.endpoint(&["auth", "v1", "signup"]))
            .json(&PasswordGrantDto {
                email: credentials.email(),
                password: credentials.password(),
            })
            .send()
            .await
            .map_err(auth_transport_error)?;
        let body: SignUpDto = auth_json(response).await?;
        Ok(body.into_principal())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<RawSession, AuthError> {
        let session = self.password_grant(credentials).await?;
        Ok(session.into_session(self.clock.utc()))
    }

    async fn sign_out(&self, session: &RawSession) -> Result<(), AuthError> {
        let response = self
            .client
            .post(self.endpoint(&["auth", "v1", "logout"]))
            .header(AUTHORIZATION, bearer(&session.access_token))
            .send()
            .await
            .map_err(auth_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(map_auth_status(status, &body))
    }

    async fn refresh(&self, session: &RawSession) -> Result<RawSession, AuthError> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Err(AuthError::session_expired());
        };
        let mut url = self.endpoint(&["auth", "v1", "token"]);
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");
        let response = self
            .client
            .post(url)
            .header("apikey", self.anon_key.clone())
            .json(&RefreshGrantDto { refresh_token })
            .send()
            .await
            .map_err(auth_transport_error)?;
        let fresh: SessionDto = auth_json(response).await?;
        Ok(fresh.into_session(self.clock.utc()))
    }
}

async fn auth_json<T: DeserializeOwned>(response: Response) -> Result<T, AuthError> {
    let status = response.status();
    let body = response.bytes().await.map_err(auth_transport_error)?;
    if !status.is_success() {
        return Err(map_auth_status(status, &body));
    }
    serde_json::from_slice(&body)
        .map_err(|err| AuthError::rejected(format!("unexpected auth response: {err}")))
}

fn auth_transport_error(error: reqwest::Error) -> AuthError {
    AuthError::unavailable(error.to_string())
}

fn map_auth_status(status: StatusCode, body: &[u8]) -> AuthError {
    let dto: AuthErrorDto = serde_json::from_slice(body).unwrap_or_default();
    let code = dto.code();
    let text = dto.text();
    match (status, code) {
        (_, "invalid_credentials" | "invalid_grant") if text != "refresh_token_not_found" => {
            AuthError::invalid_credentials()
        }
        (_, "user_already_exists" | "email_exists") => AuthError::already_registered(),
        (StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST, _)
            if text.to_ascii_lowercase().contains("already registered") =>
        {
            AuthError::already_registered()
        }
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => AuthError::session_expired(),
        _ if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
            AuthError::unavailable(format!("status {}", status.as_u16()))
        }
        _ => AuthError::rejected(if text.is_empty() {
            format!("status {}", status.as_u16())
        } else {
            text.to_owned()
        }),
    }
}

#[async_trait]
impl DataService for RemoteHttpClient {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, QueryError> {
        let mut params = filter_params(query.filters());
        params.push(("select".to_owned(), "*".to_owned()));
        if let Some((column, order)) = query.ordering() {
            let direction = match order {
                Order::Ascending => "asc",
                Order::Descending => "desc",
            };
            params.push(("order".to_owned(), format!("{column}.{direction}")));
        }
        if let Some(limit) = query.row_limit() {
            params.push(("limit".to_owned(), limit.to_string()));
        }
        let request = self
            .client
            .get(self.endpoint(&["rest", "v1", query.table().as_str()]))
            .query(&params);
        rest_rows(self.with_service_key(request), query.table()).await
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, QueryError> {
        let request = self
            .client
            .post(self.endpoint(&["rest", "v1", table.as_str()]))
            .header("Prefer", "return=representation")
            .json(&rows);
        rest_rows(self.with_service_key(request), table).await
    }

    async fn update(
        &self,
        table: Table,
        filters: &[RowFilter],
        patch: Row,
    ) -> Result<Vec<Row>, QueryError> {
        let request = self
            .client
            .patch(self.endpoint(&["rest", "v1", table.as_str()]))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        rest_rows(self.with_service_key(request), table).await
    }

    async fn delete(&self, table: Table, filters: &[RowFilter]) -> Result<usize, QueryError> {
        if filters.is_empty() {
            return Err(QueryError::rejected("refusing unfiltered delete"));
        }
        let request = self
            .client
            .delete(self.endpoint(&["rest", "v1", table.as_str()]))
            .query(&filter_params(filters))
            .header("Prefer", "return=representation");
        rest_rows(self.with_service_key(request), table)
            .await
            .map(|rows| rows.len())
    }
}

fn filter_params(filters: &[RowFilter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| (filter.column().to_owned(), format!("eq.{}", filter.value())))
        .collect()
}

async fn rest_rows(request: RequestBuilder, table: Table) -> Result<Vec<Row>, QueryError> {
    let response = request.send().await.map_err(query_transport_error)?;
    let status = response.status();
    let body = response.bytes().await.map_err(query_transport_error)?;
    if !status.is_success() {
        return Err(map_rest_status(status, &body));
    }
    debug!(%table, status = status.as_u16(), bytes = body.len(), "rest call");
    if body.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&body).map_err(|err| QueryError::decode(err.to_string()))
}

fn query_transport_error(error: reqwest::Error) -> QueryError {
    QueryError::unavailable(error.to_string())
}

/// `23505` is a unique violation, `23503` a foreign-key violation.
fn map_rest_status(status: StatusCode, body: &[u8]) -> QueryError {
    let dto: RestErrorDto = serde_json::from_slice(body).unwrap_or_default();
    let message = dto
        .message
        .unwrap_or_else(|| format!("status {}", status.as_u16()));
    match (status, dto.code.as_deref()) {
        (_, Some("23505" | "23503")) | (StatusCode::CONFLICT, _) => QueryError::conflict(message),
        (_, Some("42501")) | (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            QueryError::forbidden(message)
        }
        _ if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
            QueryError::unavailable(message)
        }
        _ => QueryError::rejected(message),
    }
}

#[async_trait]
impl FunctionInvoker for RemoteHttpClient {
    async fn invoke(&self, name: FunctionName, body: Value) -> Result<Value, InvokeError> {
        let request = self
            .client
            .post(self.endpoint(&["functions", "v1", name.as_str()]))
            .json(&body);
        let response = self
            .with_service_key(request)
            .send()
            .await
            .map_err(|err| InvokeError::unavailable(err.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| InvokeError::unavailable(err.to_string()))?;
        if !status.is_success() {
            return Err(InvokeError::failed(status.as_u16(), body_preview(&bytes)));
        }
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|err| InvokeError::decode(err.to_string()))
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        let head: String = compact.chars().take(PREVIEW_CHAR_LIMIT).collect();
        format!("{head}...")
    } else {
        compact
    }
}
