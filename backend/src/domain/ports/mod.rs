//! Ports the domain uses to reach the Remote Data Service.
//!
//! Every adapter maps its failures into the typed errors declared here, so
//! services can decide per call whether a failure is surfaced or absorbed.

mod macros;
pub(crate) use macros::define_port_error;

mod auth_gateway;
mod data_service;
mod function_invoker;
mod session_source;

#[cfg(test)]
pub use auth_gateway::MockAuthGateway;
pub use auth_gateway::{AuthError, AuthGateway};
#[cfg(test)]
pub use data_service::MockDataService;
pub use data_service::{
    DataService, Order, Query, QueryError, Row, RowFilter, Table, decode_rows, encode_row,
};
#[cfg(test)]
pub use function_invoker::MockFunctionInvoker;
pub use function_invoker::{FunctionInvoker, FunctionName, InvokeError};
#[cfg(test)]
pub use session_source::MockSessionSource;
pub use session_source::SessionSource;
