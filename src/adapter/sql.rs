//! Code shared by the relational adapters: probing through the retry policy
//! and cache, type mapping, default rendering and column definitions.

use super::cache::{CacheKey, ExistenceCache};
use super::Statement;
use crate::driver::SqlDriver;
use crate::engine::Engine;
use crate::error::{ErrorContext, MigrateError, Result};
use crate::ident::{is_verbatim_default, IndexColumn, IndexOrder};
use crate::retry::RetryPolicy;
use crate::schema::{ColumnSpec, IndexSpec, NamedColumn};
use once_cell::sync::OnceCell;
use sea_query::{Alias, ColumnDef, Expr, Values};
use std::sync::Arc;

/// Native type vocabulary of one relational engine.
pub struct TypeCatalog {
    pub engine: Engine,
    /// Upper-case base names the engine accepts.
    pub native: &'static [&'static str],
    /// Lower-case generic name to native type.
    pub common: &'static [(&'static str, &'static str)],
    pub fallback: &'static str,
}

/// Base name of a possibly parameterized type: `varchar(320)` → `VARCHAR`,
/// `text[]` → `TEXT`.
pub fn base_type_name(raw: &str) -> String {
    raw.split('(')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_end_matches("[]")
        .trim()
        .to_ascii_uppercase()
}

impl TypeCatalog {
    pub fn is_native(&self, raw: &str) -> bool {
        let base = base_type_name(raw);
        !base.is_empty() && self.native.contains(&base.as_str())
    }

    /// Override → native generic → common name → fallback with a warning.
    pub fn map(&self, table: &str, column: NamedColumn<'_>) -> Result<String> {
        let spec = column.spec;
        if let Some(native) = spec.native.as_ref().and_then(|n| n.native_type.as_deref()) {
            if self.is_native(native) {
                return Ok(native.trim().to_ascii_uppercase());
            }
            return Err(MigrateError::configuration(format!(
                "{} {table}.{}: native type {native:?} is not supported",
                self.engine,
                column.physical_name()
            )));
        }

        let generic = spec.column_type.trim();
        if self.is_native(generic) {
            return Ok(generic.to_ascii_uppercase());
        }
        let lookup = base_type_name(generic).to_ascii_lowercase();
        if let Some((_, native)) = self.common.iter().find(|(name, _)| *name == lookup) {
            return Ok((*native).to_string());
        }

        log::warn!(
            target: "schemaguard",
            "{} {table}.{}: unknown type {generic:?}, falling back to {}",
            self.engine,
            column.physical_name(),
            self.fallback
        );
        Ok(self.fallback.to_string())
    }
}

/// Expression for a column default, if the column has one.
pub fn default_expr(spec: &ColumnSpec) -> Option<Expr> {
    match spec.effective_default()? {
        serde_json::Value::Null => Some(Expr::cust("NULL")),
        serde_json::Value::Bool(b) => Some(Expr::val(b)),
        serde_json::Value::Number(n) => Some(Expr::cust(n.to_string())),
        serde_json::Value::String(s) if is_verbatim_default(&s) => {
            Some(Expr::cust(s.trim().to_string()))
        }
        serde_json::Value::String(s) => Some(Expr::val(s)),
        other => Some(Expr::val(other.to_string())),
    }
}

/// Column definition shared by CREATE TABLE and ADD COLUMN.
///
/// `inline_primary` marks the column itself as the primary key; composite
/// keys are declared on the table instead.
pub fn column_def(native_type: &str, column: NamedColumn<'_>, inline_primary: bool) -> ColumnDef {
    let spec = column.spec;
    let mut def = ColumnDef::new(Alias::new(column.physical_name()));
    def.custom(Alias::new(native_type));
    if spec.is_nullable() && !inline_primary {
        def.null();
    } else {
        def.not_null();
    }
    if inline_primary {
        def.primary_key();
    } else if spec.unique {
        def.unique_key();
    }
    if let Some(expr) = default_expr(spec) {
        def.default(expr);
    }
    def
}

/// Primary key columns: the explicit list, else every `primary` column.
pub fn primary_key_columns<'a>(
    declared: &'a [String],
    columns: &[NamedColumn<'a>],
) -> Vec<&'a str> {
    if !declared.is_empty() {
        return declared.iter().map(String::as_str).collect();
    }
    columns
        .iter()
        .filter(|c| c.spec.primary)
        .map(|c| c.physical_name())
        .collect()
}

/// Parsed index columns; any expression outside the allowlist is an error.
pub fn index_columns(engine: Engine, table: &str, index: &IndexSpec) -> Result<Vec<IndexColumn>> {
    index
        .columns
        .iter()
        .map(|raw| {
            IndexColumn::parse(raw).map_err(|e| match e {
                MigrateError::Configuration(msg) => {
                    MigrateError::Configuration(format!("{engine} {table}: {msg}"))
                }
                other => other,
            })
        })
        .collect()
}

/// Apply parsed index columns to a SeaQuery index statement. Returns
/// `false` when a function expression is present and the statement has to
/// be rendered by hand.
pub fn apply_index_columns(
    stmt: &mut sea_query::IndexCreateStatement,
    columns: &[IndexColumn],
) -> bool {
    if columns
        .iter()
        .any(|c| matches!(c, IndexColumn::Function { .. }))
    {
        return false;
    }
    for column in columns {
        if let IndexColumn::Column { name, order } = column {
            match order {
                Some(IndexOrder::Asc) => {
                    stmt.col((Alias::new(name.as_str()), sea_query::IndexOrder::Asc));
                }
                Some(IndexOrder::Desc) => {
                    stmt.col((Alias::new(name.as_str()), sea_query::IndexOrder::Desc));
                }
                None => {
                    stmt.col(Alias::new(name.as_str()));
                }
            }
        }
    }
    true
}

/// Render the column list of an expression index with quoted identifiers.
pub fn render_index_columns(engine: Engine, columns: &[IndexColumn]) -> String {
    columns
        .iter()
        .map(|column| match column {
            IndexColumn::Column {
                order: Some(IndexOrder::Desc),
                ..
            } => format!("{} DESC", column.render_expression(engine)),
            IndexColumn::Column {
                order: Some(IndexOrder::Asc),
                ..
            } => format!("{} ASC", column.render_expression(engine)),
            IndexColumn::Function { .. } => format!("({})", column.render_expression(engine)),
            IndexColumn::Column { .. } => column.render_expression(engine),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Driver access shared by both relational adapters.
pub struct SqlCore {
    engine: Engine,
    driver: Arc<dyn SqlDriver>,
    retry: RetryPolicy,
    cache: ExistenceCache,
    schema: OnceCell<String>,
}

impl SqlCore {
    pub fn new(engine: Engine, driver: Arc<dyn SqlDriver>) -> Self {
        Self {
            engine,
            driver,
            retry: RetryPolicy::default(),
            cache: ExistenceCache::default(),
            schema: OnceCell::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: ExistenceCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Schema the driver works in, read once per adapter.
    pub fn schema_name(&self) -> Result<String> {
        self.schema
            .get_or_try_init(|| {
                let ctx = ErrorContext::new(self.engine, "schema_name");
                self.retry.run(&ctx, || self.driver.schema_name())
            })
            .cloned()
    }

    /// Run a catalog probe, answering from the cache when possible.
    pub fn probe(
        &self,
        key: CacheKey,
        operation: &'static str,
        query: (String, Values),
    ) -> Result<bool> {
        if let Some(exists) = self.cache.get(&key) {
            return Ok(exists);
        }
        let mut ctx = ErrorContext::new(self.engine, operation).table(key.table.as_str());
        if let Some(name) = &key.name {
            ctx = ctx.element(name.as_str());
        }
        let (sql, values) = query;
        let exists = self
            .retry
            .run(&ctx, || self.driver.get_row(&sql, &values))?
            .is_some();
        log::debug!(
            target: "schemaguard",
            "{} probe {:?} {}.{}: exists={exists}",
            self.engine,
            key.kind,
            key.table,
            key.name.as_deref().unwrap_or("-")
        );
        self.cache.insert(key, exists);
        Ok(exists)
    }

    pub fn execute(&self, statement: &Statement) -> Result<()> {
        let Statement::Sql { table, sql, values } = statement else {
            return Err(MigrateError::configuration(format!(
                "{} adapter cannot run wide-column request {statement}",
                self.engine
            )));
        };
        let ctx = ErrorContext::new(self.engine, "execute").table(table.as_str());
        let result = self.retry.run(&ctx, || self.driver.execute(sql, values));
        self.cache.invalidate_table(table);
        result.map(|_| ())
    }

    pub fn invalidate_cache(&self) {
        self.cache.clear();
    }
}
