//! Driven port for the hosted relational store.
//!
//! Rows travel as JSON objects; typed entities convert through
//! [`encode_row`] and [`decode_rows`] so adapters stay schema agnostic.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::define_port_error;

/// A single row as a JSON object.
pub type Row = Map<String, Value>;

/// Named collections of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Profiles,
    Contributions,
    BalanceAdjustments,
    AdminMessages,
    UserRoles,
    SmsLogs,
    PaymentTransactions,
}

impl Table {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Contributions => "contributions",
            Self::BalanceAdjustments => "balance_adjustments",
            Self::AdminMessages => "admin_messages",
            Self::UserRoles => "user_roles",
            Self::SmsLogs => "sms_logs",
            Self::PaymentTransactions => "payment_transactions",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filter `column = value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    column: &'static str,
    value: String,
}

impl RowFilter {
    pub fn eq(column: &'static str, value: impl fmt::Display) -> Self {
        Self {
            column,
            value: value.to_string(),
        }
    }

    #[must_use]
    pub const fn column(&self) -> &'static str {
        self.column
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True when `row` holds a matching value. Non-string values compare by
    /// their JSON rendering.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        match row.get(self.column) {
            Some(Value::String(text)) => text == &self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// Select over one table.
///
/// # Examples
/// ```
/// use chama::domain::ports::{Order, Query, RowFilter, Table};
///
/// let query = Query::from(Table::Contributions)
///     .filter(RowFilter::eq("user_id", "42"))
///     .order_by("contribution_date", Order::Descending)
///     .limit(10);
/// assert_eq!(query.table(), Table::Contributions);
/// assert_eq!(query.filters().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    table: Table,
    filters: Vec<RowFilter>,
    order: Option<(&'static str, Order)>,
    limit: Option<usize>,
}

impl From<Table> for Query {
    fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }
}

impl Query {
    #[must_use]
    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub const fn order_by(mut self, column: &'static str, order: Order) -> Self {
        self.order = Some((column, order));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn table(&self) -> Table {
        self.table
    }

    #[must_use]
    pub fn filters(&self) -> &[RowFilter] {
        &self.filters
    }

    #[must_use]
    pub const fn ordering(&self) -> Option<(&'static str, Order)> {
        self.order
    }

    #[must_use]
    pub const fn row_limit(&self) -> Option<usize> {
        self.limit
    }
}

define_port_error! {
    /// Failures raised by data service adapters.
    pub enum QueryError {
        /// Store unreachable or timing out.
        Unavailable { message: String } => "data service unavailable: {message}",
        /// Uniqueness or foreign-key constraint violated.
        Conflict { message: String } => "data constraint violated: {message}",
        /// Row-level policy refused the request.
        Forbidden { message: String } => "data access refused: {message}",
        /// Request rejected for another reason.
        Rejected { message: String } => "data request rejected: {message}",
        /// Row could not be converted to or from its entity.
        Decode { message: String } => "row shape mismatch: {message}",
    }
}

/// Generic CRUD over named collections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DataService: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, QueryError>;

    /// Insert rows and return them as stored.
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, QueryError>;

    /// Apply `patch` to every row matching all `filters`; returns updated rows.
    async fn update(
        &self,
        table: Table,
        filters: &[RowFilter],
        patch: Row,
    ) -> Result<Vec<Row>, QueryError>;

    /// Delete rows matching all `filters`; returns how many went.
    async fn delete(&self, table: Table, filters: &[RowFilter]) -> Result<usize, QueryError>;
}

/// Serialise an entity into a row.
pub fn encode_row<T: Serialize>(value: &T) -> Result<Row, QueryError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(other) => Err(QueryError::decode(format!(
            "expected an object, got {other}"
        ))),
        Err(err) => Err(QueryError::decode(err.to_string())),
    }
}

/// Deserialise rows into entities.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, QueryError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row))
                .map_err(|err| QueryError::decode(err.to_string()))
        })
        .collect()
}
