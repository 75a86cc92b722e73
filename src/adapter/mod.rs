//! Engine adapters: existence probes, type mapping and statement builders.
//!
//! One adapter per engine. Relational adapters share their probing and
//! column-definition code in [`sql`]; the wide-column adapter speaks JSON
//! requests. Every driver call goes through the adapter's [`RetryPolicy`].
//!
//! [`RetryPolicy`]: crate::retry::RetryPolicy

pub mod cache;
pub mod dynamo;
pub mod mysql;
pub mod postgres;
pub mod sql;

pub use cache::{CacheKey, ExistenceCache};
pub use dynamo::DynamoAdapter;
pub use mysql::MysqlAdapter;
pub use postgres::PostgresAdapter;

use crate::engine::Engine;
use crate::error::Result;
use crate::schema::{
    AttributeType, GsiSpec, IndexSpec, NamedColumn, RelationalTableSpec, WideColumnTableSpec,
};
use sea_query::Values;
use serde::Serialize;
use std::fmt;

/// A mutating statement built by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    /// Relational DDL with its bound values.
    Sql {
        table: String,
        sql: String,
        #[serde(skip)]
        values: Values,
    },
    /// Wide-column control-plane request.
    Request {
        table: String,
        action: String,
        payload: serde_json::Value,
    },
}

impl Statement {
    pub fn sql(table: impl Into<String>, sql: impl Into<String>) -> Self {
        Statement::Sql {
            table: table.into(),
            sql: sql.into(),
            values: Values(Vec::new()),
        }
    }

    pub fn request(
        table: impl Into<String>,
        action: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Statement::Request {
            table: table.into(),
            action: action.into(),
            payload,
        }
    }

    /// Physical table the statement touches.
    pub fn table(&self) -> &str {
        match self {
            Statement::Sql { table, .. } | Statement::Request { table, .. } => table,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Sql { sql, .. } => f.write_str(sql),
            Statement::Request {
                action, payload, ..
            } => write!(f, "{action} {payload}"),
        }
    }
}

/// Operations every engine adapter supports.
pub trait SchemaAdapter: Send + Sync {
    fn engine(&self) -> Engine;

    fn exists_table(&self, table: &str) -> Result<bool>;

    /// Relational index or wide-column global secondary index.
    fn exists_index(&self, table: &str, index: &str) -> Result<bool>;

    /// Run a mutating statement, then forget cached probes for its table.
    fn execute(&self, statement: &Statement) -> Result<()>;

    /// Forget every cached probe result.
    fn invalidate_cache(&self);
}

/// PostgreSQL and MySQL.
pub trait RelationalAdapter: SchemaAdapter {
    fn exists_column(&self, table: &str, column: &str) -> Result<bool>;

    /// Native column type for `column`.
    fn map_type(&self, table: &str, column: NamedColumn<'_>) -> Result<String>;

    /// `CREATE TABLE` with the columns active at `version`.
    fn build_create_table(
        &self,
        table: &str,
        spec: &RelationalTableSpec,
        version: f64,
    ) -> Result<Statement>;

    fn build_add_column(&self, table: &str, column: NamedColumn<'_>) -> Result<Statement>;

    fn build_create_index(&self, table: &str, index: &IndexSpec) -> Result<Statement>;
}

/// DynamoDB-style engine with global secondary indexes.
pub trait WideColumnAdapter: SchemaAdapter {
    /// Storage type of a key attribute.
    fn map_type(&self, spec: &WideColumnTableSpec, attribute: &str) -> Result<AttributeType>;

    /// `CreateTable` declaring the table keys and every GSI active at `version`.
    fn build_create_table(
        &self,
        table: &str,
        spec: &WideColumnTableSpec,
        version: f64,
    ) -> Result<Statement>;

    /// `UpdateTable` adding one GSI to an existing table. Reads the live
    /// table description to declare only missing key attributes.
    fn build_create_index(
        &self,
        table: &str,
        spec: &WideColumnTableSpec,
        gsi: &GsiSpec,
    ) -> Result<Statement>;
}
