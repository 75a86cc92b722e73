//! # Schemaguard
//!
//! Lifecycle-aware, additive-only schema migrations for PostgreSQL, MySQL
//! and DynamoDB-style wide-column stores, on the `may` coroutine runtime.
//!
//! A declarative [`SchemaDocument`] tags tables, columns, indexes and
//! global secondary indexes with `since` / `removed_in` versions. Against
//! the current version of each table the [`SchemaMigrator`] plans what is
//! missing, creates only that, and verifies that every active element
//! exists. Nothing is ever dropped: elements past their `removed_in`
//! version are reported for manual action.

pub mod adapter;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod ident;
pub mod lifecycle;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod migration;
pub mod observer;
pub mod retry;
pub mod schema;
pub mod version;

pub use adapter::{DynamoAdapter, MysqlAdapter, PostgresAdapter};
pub use config::SchemaguardConfig;
pub use driver::{DriverError, PostgresDriver, SqlDriver, WideColumnDriver};
pub use engine::Engine;
pub use error::{MigrateError, Result};
pub use lifecycle::{classify, Classification, LifecycleContext, Phase};
pub use migration::{
    ApplyOptions, ApplyReport, Plan, PlanOptions, SchemaDiff, SchemaMigrator, ValidationResult,
};
pub use observer::{LogObserver, Observer};
pub use retry::RetryPolicy;
pub use schema::SchemaDocument;
pub use version::{EnvVersions, StaticVersions, VersionSource};
