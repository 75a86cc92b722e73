//! Error taxonomy for planning, applying and validating schema changes.
//!
//! Driver errors never leave an adapter in raw form: they are classified,
//! sanitized and wrapped into [`MigrateError::Transient`] (retries exhausted)
//! or [`MigrateError::Driver`] (fatal) by [`crate::retry::RetryPolicy::run`].

use crate::engine::Engine;
use crate::migration::validator::ElementCheck;
use crate::retry::SanitizedError;
use std::fmt;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T, E = MigrateError> = std::result::Result<T, E>;

/// Errors surfaced by the migrator.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Bad lifecycle bounds, unsupported native type, missing engine-specific
    /// field. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The schema document could not be read or parsed.
    #[error("schema document error: {0}")]
    Document(String),

    /// A transient infrastructure failure that outlived the retry policy.
    #[error("transient infrastructure error: {0}")]
    Transient(SanitizedError),

    /// A fatal driver failure.
    #[error("driver error: {0}")]
    Driver(SanitizedError),

    /// One or more active elements are physically missing.
    #[error(
        "schema validation failed: {} active element(s) missing\n{}",
        .errors.len(),
        .errors.join("\n")
    )]
    ValidationFailed {
        /// One message per active-but-missing element.
        errors: Vec<String>,
        /// Every check performed during the pass.
        checks: Vec<ElementCheck>,
    },
}

impl MigrateError {
    pub fn configuration(message: impl Into<String>) -> Self {
        MigrateError::Configuration(message.into())
    }

    /// True when the error came from an infrastructure failure that may
    /// succeed if the whole pass is re-run later.
    pub fn is_transient(&self) -> bool {
        matches!(self, MigrateError::Transient(_))
    }
}

/// Where a driver call happened; rendered as bracketed tags when sanitizing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub engine: Option<Engine>,
    pub operation: &'static str,
    pub table: Option<String>,
    pub element: Option<String>,
}

impl ErrorContext {
    pub fn new(engine: Engine, operation: &'static str) -> Self {
        Self {
            engine: Some(engine),
            operation,
            table: None,
            element: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    /// Render the context as `[engine=..][op=..][table=..][element=..]`.
    pub fn tags(&self) -> String {
        let mut tags = String::new();
        if let Some(engine) = self.engine {
            tags.push_str(&format!("[engine={engine}]"));
        }
        if !self.operation.is_empty() {
            tags.push_str(&format!("[op={}]", self.operation));
        }
        if let Some(table) = &self.table {
            tags.push_str(&format!("[table={table}]"));
        }
        if let Some(element) = &self.element {
            tags.push_str(&format!("[element={element}]"));
        }
        tags
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tags())
    }
}
