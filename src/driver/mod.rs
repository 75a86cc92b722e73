//! Driver collaborator contracts.
//!
//! Adapters talk to engines only through these traits. Connection pooling,
//! authentication and wire protocols belong to the implementations; the
//! migrator only needs single-row probes, statement execution and (for the
//! wide-column engine) raw JSON requests.

pub mod postgres;

pub use postgres::PostgresDriver;

use sea_query::Values;
use std::fmt;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Error reported by a driver before classification and sanitizing.
///
/// `code` carries whatever the engine reports: a SQLSTATE, a MySQL error
/// name, a POSIX socket error or a wide-column exception type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub code: Option<String>,
    pub message: String,
    pub trace: Option<String>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            trace: None,
        }
    }

    pub fn trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// True when the error code names `code` exactly.
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DriverError {}

/// Relational driver (PostgreSQL, MySQL).
pub trait SqlDriver: Send + Sync {
    /// Run a query and return its first row, if any.
    fn get_row(&self, sql: &str, values: &Values) -> Result<Option<Row>, DriverError>;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, sql: &str, values: &Values) -> Result<u64, DriverError>;

    /// Schema (PostgreSQL) or database (MySQL) the connection works in.
    fn schema_name(&self) -> Result<String, DriverError>;
}

/// Wide-column driver speaking the engine's JSON request protocol.
pub trait WideColumnDriver: Send + Sync {
    fn raw_request(
        &self,
        action: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, DriverError>;
}
