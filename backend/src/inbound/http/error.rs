//! HTTP mapping for [`Error`].
//!
//! The domain error stays transport agnostic; this module picks the status
//! code, echoes the trace id header and hides internal messages. Extractor
//! failures (bad JSON, bad path segments, bad query strings) are turned into
//! the same payload so clients see one error schema everywhere.

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, ResponseError, http::StatusCode, web};
use serde_json::json;
use tracing::error;

use crate::domain::{Error, ErrorCode, TRACE_ID_HEADER};

pub use crate::domain::ApiResult;

const INTERNAL_MESSAGE: &str = "Internal server error";

const fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn client_view(error: &Error) -> Error {
    if error.code() == ErrorCode::InternalError {
        error!(code = ?error.code(), message = error.message(), "request failed");
        let redacted = Error::internal(INTERNAL_MESSAGE);
        return match error.trace_id() {
            Some(id) => redacted.with_trace_id(id),
            None => redacted,
        };
    }
    error.clone()
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id));
        }
        builder.json(client_view(self))
    }
}

fn extractor_error(kind: &'static str, detail: String) -> actix_web::Error {
    Error::invalid_request(format!("malformed {kind}"))
        .with_details(json!({ "reason": detail }))
        .into()
}

/// JSON body settings shared by every scope.
#[must_use]
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            extractor_error("request body", err.to_string())
        })
}

#[must_use]
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err: PathError, _req: &HttpRequest| extractor_error("path", err.to_string()))
}

#[must_use]
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req: &HttpRequest| {
        extractor_error("query string", err.to_string())
    })
}
