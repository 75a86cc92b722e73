//! PostgreSQL adapter.
//!
//! Probes read `information_schema` (tables, columns) and `pg_indexes`,
//! scoped to the connection's current schema. DDL is idempotent:
//! `CREATE TABLE IF NOT EXISTS`, `ADD COLUMN IF NOT EXISTS`,
//! `CREATE INDEX IF NOT EXISTS`.

use super::cache::{CacheKey, ExistenceCache};
use super::sql::{self, SqlCore, TypeCatalog};
use super::{RelationalAdapter, SchemaAdapter, Statement};
use crate::config::SchemaguardConfig;
use crate::driver::SqlDriver;
use crate::engine::Engine;
use crate::error::Result;
use crate::ident::quote_identifier;
use crate::lifecycle::partition;
use crate::retry::RetryPolicy;
use crate::schema::{ElementKind, IndexSpec, NamedColumn, RelationalTableSpec};
use sea_query::{Alias, Expr, ExprTrait, Index, PostgresQueryBuilder, Query, Table};
use std::sync::Arc;

pub const POSTGRES_TYPES: TypeCatalog = TypeCatalog {
    engine: Engine::Postgres,
    native: &[
        "SMALLINT", "INTEGER", "INT", "INT2", "INT4", "INT8", "BIGINT", "SMALLSERIAL", "SERIAL",
        "BIGSERIAL", "REAL", "FLOAT4", "FLOAT8", "DOUBLE PRECISION", "NUMERIC", "DECIMAL",
        "MONEY", "BOOLEAN", "BOOL", "TEXT", "CITEXT", "VARCHAR", "CHARACTER VARYING", "CHAR",
        "CHARACTER", "UUID", "JSON", "JSONB", "BYTEA", "DATE", "TIME", "TIMETZ", "TIMESTAMP",
        "TIMESTAMPTZ", "INTERVAL", "INET", "CIDR", "MACADDR", "TSVECTOR", "XML",
    ],
    common: &[
        ("string", "TEXT"),
        ("str", "TEXT"),
        ("email", "VARCHAR(320)"),
        ("enum", "TEXT"),
        ("long", "BIGINT"),
        ("i32", "INTEGER"),
        ("i64", "BIGINT"),
        ("float", "DOUBLE PRECISION"),
        ("double", "DOUBLE PRECISION"),
        ("f64", "DOUBLE PRECISION"),
        ("number", "NUMERIC"),
        ("datetime", "TIMESTAMPTZ"),
        ("binary", "BYTEA"),
        ("bytes", "BYTEA"),
        ("blob", "BYTEA"),
        ("object", "JSONB"),
        ("array", "JSONB"),
    ],
    fallback: "TEXT",
};

pub struct PostgresAdapter {
    core: SqlCore,
}

impl PostgresAdapter {
    pub fn new(driver: Arc<dyn SqlDriver>) -> Self {
        Self {
            core: SqlCore::new(Engine::Postgres, driver),
        }
    }

    /// Adapter using the configured retry policy and a fresh existence cache.
    pub fn from_config(driver: Arc<dyn SqlDriver>, config: &SchemaguardConfig) -> Self {
        Self::new(driver)
            .with_retry(config.retry_policy())
            .with_cache(config.existence_cache())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.core = self.core.with_retry(retry);
        self
    }

    pub fn with_cache(mut self, cache: ExistenceCache) -> Self {
        self.core = self.core.with_cache(cache);
        self
    }
}

fn serial_for(native: &str) -> Option<&'static str> {
    match sql::base_type_name(native).as_str() {
        "SMALLINT" | "INT2" => Some("SMALLSERIAL"),
        "INTEGER" | "INT" | "INT4" => Some("SERIAL"),
        "BIGINT" | "INT8" => Some("BIGSERIAL"),
        _ => None,
    }
}

impl SchemaAdapter for PostgresAdapter {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn exists_table(&self, table: &str) -> Result<bool> {
        let schema = self.core.schema_name()?;
        let query = Query::select()
            .expr(Expr::cust("1"))
            .from((Alias::new("information_schema"), Alias::new("tables")))
            .and_where(Expr::col(Alias::new("table_schema")).eq(schema))
            .and_where(Expr::col(Alias::new("table_name")).eq(table))
            .limit(1)
            .build(PostgresQueryBuilder);
        self.core.probe(CacheKey::table(table), "exists_table", query)
    }

    fn exists_index(&self, table: &str, index: &str) -> Result<bool> {
        let schema = self.core.schema_name()?;
        let query = Query::select()
            .expr(Expr::cust("1"))
            .from(Alias::new("pg_indexes"))
            .and_where(Expr::col(Alias::new("schemaname")).eq(schema))
            .and_where(Expr::col(Alias::new("tablename")).eq(table))
            .and_where(Expr::col(Alias::new("indexname")).eq(index))
            .limit(1)
            .build(PostgresQueryBuilder);
        self.core.probe(
            CacheKey::child(ElementKind::Index, table, index),
            "exists_index",
            query,
        )
    }

    fn execute(&self, statement: &Statement) -> Result<()> {
        self.core.execute(statement)
    }

    fn invalidate_cache(&self) {
        self.core.invalidate_cache();
    }
}

impl RelationalAdapter for PostgresAdapter {
    fn exists_column(&self, table: &str, column: &str) -> Result<bool> {
        let schema = self.core.schema_name()?;
        let query = Query::select()
            .expr(Expr::cust("1"))
            .from((Alias::new("information_schema"), Alias::new("columns")))
            .and_where(Expr::col(Alias::new("table_schema")).eq(schema))
            .and_where(Expr::col(Alias::new("table_name")).eq(table))
            .and_where(Expr::col(Alias::new("column_name")).eq(column))
            .limit(1)
            .build(PostgresQueryBuilder);
        self.core.probe(
            CacheKey::child(ElementKind::Column, table, column),
            "exists_column",
            query,
        )
    }

    fn map_type(&self, table: &str, column: NamedColumn<'_>) -> Result<String> {
        let native = POSTGRES_TYPES.map(table, column)?;
        if column.spec.auto_increment {
            if let Some(serial) = serial_for(&native) {
                return Ok(serial.to_string());
            }
            log::warn!(
                target: "schemaguard",
                "postgres {table}.{}: auto_increment ignored for type {native}",
                column.physical_name()
            );
        }
        Ok(native)
    }

    fn build_create_table(
        &self,
        table: &str,
        spec: &RelationalTableSpec,
        version: f64,
    ) -> Result<Statement> {
        let columns = spec.named_columns();
        let active: Vec<NamedColumn<'_>> = partition(columns.iter(), version)?
            .active
            .into_iter()
            .copied()
            .collect();
        let primary = sql::primary_key_columns(&spec.primary_key, &active);
        let inline = primary.len() == 1;

        let mut stmt = Table::create();
        stmt.table(Alias::new(table)).if_not_exists();
        for column in &active {
            let native = self.map_type(table, *column)?;
            let is_pk = inline && primary.contains(&column.physical_name());
            stmt.col(sql::column_def(&native, *column, is_pk));
        }
        if primary.len() > 1 {
            let mut pk = Index::create();
            for name in &primary {
                pk.col(Alias::new(*name));
            }
            stmt.primary_key(&mut pk);
        }
        Ok(Statement::sql(table, stmt.build(PostgresQueryBuilder)))
    }

    fn build_add_column(&self, table: &str, column: NamedColumn<'_>) -> Result<Statement> {
        let native = self.map_type(table, column)?;
        let mut def = sql::column_def(&native, column, false);
        let stmt = Table::alter()
            .table(Alias::new(table))
            .add_column_if_not_exists(&mut def)
            .to_owned();
        Ok(Statement::sql(table, stmt.build(PostgresQueryBuilder)))
    }

    fn build_create_index(&self, table: &str, index: &IndexSpec) -> Result<Statement> {
        let name = index.resolved_name(table);
        let columns = sql::index_columns(Engine::Postgres, table, index)?;

        let mut stmt = Index::create();
        stmt.name(name.as_str())
            .table(Alias::new(table))
            .if_not_exists();
        if index.unique {
            stmt.unique();
        }
        if sql::apply_index_columns(&mut stmt, &columns) {
            return Ok(Statement::sql(table, stmt.build(PostgresQueryBuilder)));
        }

        let sql = format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote_identifier(Engine::Postgres, &name),
            quote_identifier(Engine::Postgres, table),
            sql::render_index_columns(Engine::Postgres, &columns)
        );
        Ok(Statement::sql(table, sql))
    }
}
