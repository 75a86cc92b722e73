//! The adapters a migrator was built with, one optional slot per engine.

use crate::adapter::{RelationalAdapter, Statement, WideColumnAdapter};
use crate::engine::Engine;
use crate::error::{MigrateError, Result};
use crate::schema::SchemaElement;

#[derive(Default)]
pub struct Adapters {
    pub postgres: Option<Box<dyn RelationalAdapter>>,
    pub mysql: Option<Box<dyn RelationalAdapter>>,
    pub dynamodb: Option<Box<dyn WideColumnAdapter>>,
}

impl Adapters {
    pub fn relational(&self, engine: Engine) -> Option<&dyn RelationalAdapter> {
        match engine {
            Engine::Postgres => self.postgres.as_deref(),
            Engine::Mysql => self.mysql.as_deref(),
            Engine::Dynamodb => None,
        }
    }

    pub fn wide_column(&self) -> Option<&dyn WideColumnAdapter> {
        self.dynamodb.as_deref()
    }

    pub fn has(&self, engine: Engine) -> bool {
        match engine {
            Engine::Dynamodb => self.dynamodb.is_some(),
            relational => self.relational(relational).is_some(),
        }
    }

    fn require_relational(&self, engine: Engine) -> Result<&dyn RelationalAdapter> {
        self.relational(engine)
            .ok_or_else(|| MigrateError::configuration(format!("no {engine} adapter configured")))
    }

    fn require_wide_column(&self) -> Result<&dyn WideColumnAdapter> {
        self.wide_column()
            .ok_or_else(|| MigrateError::configuration("no dynamodb adapter configured"))
    }

    /// Probe whether `element` physically exists.
    pub fn exists(&self, element: &SchemaElement<'_>) -> Result<bool> {
        let table = element.table();
        match element {
            SchemaElement::Table {
                engine: Engine::Dynamodb,
                ..
            } => self.require_wide_column()?.exists_table(table),
            SchemaElement::Table { engine, .. } => {
                self.require_relational(*engine)?.exists_table(table)
            }
            SchemaElement::Column { engine, name, .. } => {
                self.require_relational(*engine)?.exists_column(table, name)
            }
            SchemaElement::Index { engine, name, .. } => {
                self.require_relational(*engine)?.exists_index(table, name)
            }
            SchemaElement::SecondaryIndex { name, .. } => {
                self.require_wide_column()?.exists_index(table, name)
            }
        }
    }

    pub fn execute(&self, engine: Engine, statement: &Statement) -> Result<()> {
        match engine {
            Engine::Dynamodb => self.require_wide_column()?.execute(statement),
            relational => self.require_relational(relational)?.execute(statement),
        }
    }

    /// Forget every cached probe in every adapter.
    pub fn invalidate_caches(&self) {
        for engine in [Engine::Postgres, Engine::Mysql] {
            if let Some(adapter) = self.relational(engine) {
                adapter.invalidate_cache();
            }
        }
        if let Some(adapter) = self.wide_column() {
            adapter.invalidate_cache();
        }
    }
}
