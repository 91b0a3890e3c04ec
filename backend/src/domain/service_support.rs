//! Shared helpers for interactive services: port error mapping and typed
//! row access.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::ports::{
    AuthError, DataService, InvokeError, Query, QueryError, RowFilter, Table, decode_rows,
    encode_row,
};
use super::{Error, MemberProfile, PrincipalId};

pub(crate) fn map_query_error(error: QueryError) -> Error {
    match error {
        QueryError::Unavailable { message } => {
            Error::service_unavailable(format!("data service unavailable: {message}"))
        }
        QueryError::Conflict { message } => Error::conflict(format!("record conflict: {message}")),
        QueryError::Forbidden { message } => {
            Error::forbidden(format!("access refused by data policy: {message}"))
        }
        QueryError::Rejected { message } => {
            Error::internal(format!("data request rejected: {message}"))
        }
        QueryError::Decode { message } => Error::internal(format!("row shape mismatch: {message}")),
    }
}

pub(crate) fn map_auth_error(error: AuthError) -> Error {
    match error {
        AuthError::InvalidCredentials => Error::unauthorized("invalid login credentials"),
        AuthError::AlreadyRegistered => {
            Error::conflict("an account with this phone number or email already exists")
        }
        AuthError::SessionExpired => Error::unauthorized("session has expired"),
        AuthError::Rejected { message } => Error::invalid_request(message),
        AuthError::Unavailable { message } => {
            Error::service_unavailable(format!("authentication unavailable: {message}"))
        }
    }
}

pub(crate) fn map_invoke_error(error: InvokeError) -> Error {
    match error {
        InvokeError::Unavailable { message } => {
            Error::service_unavailable(format!("function host unavailable: {message}"))
        }
        InvokeError::Failed { status, message } => Error::service_unavailable(format!(
            "function failed with status {status}: {message}"
        )),
        InvokeError::Decode { message } => {
            Error::internal(format!("function reply could not be decoded: {message}"))
        }
    }
}

/// Select and decode.
pub(crate) async fn fetch<T>(data: &dyn DataService, query: Query) -> Result<Vec<T>, Error>
where
    T: DeserializeOwned,
{
    let rows = data.select(&query).await.map_err(map_query_error)?;
    decode_rows(rows).map_err(map_query_error)
}

/// Insert one entity and decode the stored row, if the adapter returned it.
pub(crate) async fn insert_one<T>(
    data: &dyn DataService,
    table: Table,
    value: &T,
) -> Result<Option<T>, Error>
where
    T: Serialize + DeserializeOwned,
{
    let row = encode_row(value).map_err(map_query_error)?;
    let stored = data
        .insert(table, vec![row])
        .await
        .map_err(map_query_error)?;
    Ok(decode_rows(stored).map_err(map_query_error)?.into_iter().next())
}

pub(crate) async fn profile_of(
    data: &dyn DataService,
    user_id: PrincipalId,
) -> Result<MemberProfile, Error> {
    let profiles: Vec<MemberProfile> = fetch(
        data,
        Query::from(Table::Profiles)
            .filter(RowFilter::eq("user_id", user_id))
            .limit(1),
    )
    .await?;
    profiles
        .into_iter()
        .next()
        .ok_or_else(|| Error::not_found(format!("member {user_id} has no profile")))
}
