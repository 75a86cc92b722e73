//! MySQL adapter.
//!
//! Probes read `information_schema.tables`, `.columns` and `.statistics`
//! scoped to `DATABASE()`. MySQL has no `IF NOT EXISTS` for columns or
//! indexes, so those statements rely on the probes that precede them.

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
use sea_query::{Alias, Expr, ExprTrait, Index, MysqlQueryBuilder, Query, Table};
use std::sync::Arc;

pub const MYSQL_TYPES: TypeCatalog = TypeCatalog {
    engine: Engine::Mysql,
    native: &[
        "TINYINT", "SMALLINT", "MEDIUMINT", "INT", "INTEGER", "BIGINT", "DECIMAL", "NUMERIC",
        "FLOAT", "DOUBLE", "BIT", "BOOLEAN", "BOOL", "CHAR", "VARCHAR", "BINARY", "VARBINARY",
        "TINYTEXT", "TEXT", "MEDIUMTEXT", "LONGTEXT", "TINYBLOB", "BLOB", "MEDIUMBLOB",
        "LONGBLOB", "ENUM", "SET", "DATE", "DATETIME", "TIMESTAMP", "TIME", "YEAR", "JSON",
    ],
    common: &[
        ("string", "VARCHAR(255)"),
        ("str", "VARCHAR(255)"),
        ("email", "VARCHAR(320)"),
        ("uuid", "CHAR(36)"),
        ("long", "BIGINT"),
        ("i32", "INT"),
        ("i64", "BIGINT"),
        ("f64", "DOUBLE"),
        ("number", "DECIMAL(20,6)"),
        ("timestamptz", "DATETIME"),
        ("jsonb", "JSON"),
        ("object", "JSON"),
        ("array", "JSON"),
        ("bytes", "BLOB"),
        ("bytea", "BLOB"),
    ],
    fallback: "TEXT",
};

pub struct MysqlAdapter {
    core: SqlCore,
}

impl MysqlAdapter {
    pub fn new(driver: Arc<dyn SqlDriver>) -> Self {
        Self {
            core: SqlCore::new(Engine::Mysql, driver),
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

    /// `in_primary_key` is true when the table-level key lists the column.
    fn column_def(
        &self,
        table: &str,
        column: NamedColumn<'_>,
        inline_primary: bool,
        in_primary_key: bool,
    ) -> Result<sea_query::ColumnDef> {
        let native = self.map_type(table, column)?;
        let mut def = sql::column_def(&native, column, inline_primary);
        if column.spec.auto_increment {
            if !is_keyed(column, in_primary_key) {
                log::warn!(
                    target: "schemaguard",
                    "mysql {table}.{}: AUTO_INCREMENT column is neither primary nor unique",
                    column.physical_name()
                );
            }
            def.auto_increment();
        }
        Ok(def)
    }
}

/// AUTO_INCREMENT needs the column to lead some key.
fn is_keyed(column: NamedColumn<'_>, in_primary_key: bool) -> bool {
    in_primary_key || column.spec.primary || column.spec.unique
}

fn in_current_database(column: &str) -> Expr {
    Expr::col(Alias::new(column)).eq(Expr::cust("DATABASE()"))
}

impl SchemaAdapter for MysqlAdapter {
    fn engine(&self) -> Engine {
        Engine::Mysql
    }

    fn exists_table(&self, table: &str) -> Result<bool> {
        let query = Query::select()
            .expr(Expr::cust("1"))
            .from((Alias::new("information_schema"), Alias::new("tables")))
            .and_where(in_current_database("table_schema"))
            .and_where(Expr::col(Alias::new("table_name")).eq(table))
            .limit(1)
            .build(MysqlQueryBuilder);
        self.core.probe(CacheKey::table(table), "exists_table", query)
    }

    fn exists_index(&self, table: &str, index: &str) -> Result<bool> {
        let query = Query::select()
            .expr(Expr::cust("1"))
            .from((Alias::new("information_schema"), Alias::new("statistics")))
            .and_where(in_current_database("table_schema"))
            .and_where(Expr::col(Alias::new("table_name")).eq(table))
            .and_where(Expr::col(Alias::new("index_name")).eq(index))
            .limit(1)
            .build(MysqlQueryBuilder);
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

impl RelationalAdapter for MysqlAdapter {
    fn exists_column(&self, table: &str, column: &str) -> Result<bool> {
        let query = Query::select()
            .expr(Expr::cust("1"))
            .from((Alias::new("information_schema"), Alias::new("columns")))
            .and_where(in_current_database("table_schema"))
            .and_where(Expr::col(Alias::new("table_name")).eq(table))
            .and_where(Expr::col(Alias::new("column_name")).eq(column))
            .limit(1)
            .build(MysqlQueryBuilder);
        self.core.probe(
            CacheKey::child(ElementKind::Column, table, column),
            "exists_column",
            query,
        )
    }

    fn map_type(&self, table: &str, column: NamedColumn<'_>) -> Result<String> {
        MYSQL_TYPES.map(table, column)
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
            let in_key = primary.contains(&column.physical_name());
            stmt.col(self.column_def(table, *column, inline && in_key, in_key)?);
        }
        if primary.len() > 1 {
            let mut pk = Index::create();
            for name in &primary {
                pk.col(Alias::new(*name));
            }
            stmt.primary_key(&mut pk);
        }
        if let Some(engine) = &spec.options.engine {
            stmt.engine(engine.as_str());
        }
        if let Some(charset) = &spec.options.charset {
            stmt.character_set(charset.as_str());
        }
        if let Some(collate) = &spec.options.collate {
            stmt.collate(collate.as_str());
        }
        Ok(Statement::sql(table, stmt.build(MysqlQueryBuilder)))
    }

    fn build_add_column(&self, table: &str, column: NamedColumn<'_>) -> Result<Statement> {
        let mut def = self.column_def(table, column, false, false)?;
        let stmt = Table::alter()
            .table(Alias::new(table))
            .add_column(&mut def)
            .to_owned();
        Ok(Statement::sql(table, stmt.build(MysqlQueryBuilder)))
    }

    fn build_create_index(&self, table: &str, index: &IndexSpec) -> Result<Statement> {
        let name = index.resolved_name(table);
        let columns = sql::index_columns(Engine::Mysql, table, index)?;

        let mut stmt = Index::create();
        stmt.name(name.as_str()).table(Alias::new(table));
        if index.unique {
            stmt.unique();
        }
        if sql::apply_index_columns(&mut stmt, &columns) {
            return Ok(Statement::sql(table, stmt.build(MysqlQueryBuilder)));
        }

        // Functional key parts need their own parentheses (MySQL 8.0.13+).
        let sql = format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            quote_identifier(Engine::Mysql, &name),
            quote_identifier(Engine::Mysql, table),
            sql::render_index_columns(Engine::Mysql, &columns)
        );
        Ok(Statement::sql(table, sql))
    }
}
