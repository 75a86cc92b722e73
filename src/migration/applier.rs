//! Apply pass: recompute the plan and create whatever is missing.
//!
//! Additions run per engine as create-table, add-column, create-index,
//! create-GSI. Removals and future items are never touched.

use super::adapters::Adapters;
use super::plan::{ApplyOptions, Plan, PlanItem};
use super::planner::SchemaPlanner;
use crate::adapter::Statement;
use crate::engine::Engine;
use crate::error::{MigrateError, Result};
use crate::observer::Observer;
use crate::schema::{ElementKind, RelationalTableSpec, SchemaDocument, WideColumnTableSpec};
use crate::version::VersionSource;
use log::Level;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// One statement built during an apply pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedStatement {
    pub engine: Engine,
    pub kind: ElementKind,
    pub table: String,
    pub element: String,
    pub statement: Statement,
    /// False in dry-run mode.
    pub executed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub run_id: Uuid,
    pub dry_run: bool,
    /// Additions executed, or that would have been executed in a dry run.
    pub additions_applied: usize,
    pub statements: Vec<AppliedStatement>,
    pub plan: Plan,
}

pub struct SchemaApplier<'a> {
    adapters: &'a Adapters,
    versions: &'a dyn VersionSource,
    observer: &'a dyn Observer,
}

impl<'a> SchemaApplier<'a> {
    pub fn new(
        adapters: &'a Adapters,
        versions: &'a dyn VersionSource,
        observer: &'a dyn Observer,
    ) -> Self {
        Self {
            adapters,
            versions,
            observer,
        }
    }

    pub fn apply(&self, doc: &SchemaDocument, options: &ApplyOptions) -> Result<ApplyReport> {
        let run_id = Uuid::new_v4();
        let plan = SchemaPlanner::new(self.adapters, self.versions, self.observer)
            .plan(doc, &options.plan_options())?;

        let mut statements = Vec::new();
        for (engine, engine_plan) in &plan.engines {
            let mut additions: Vec<&PlanItem> = engine_plan.additions.iter().collect();
            additions.sort_by_key(|item| item.kind);

            let before = statements.len();
            for item in additions {
                let version = plan.version(*engine, &item.table).ok_or_else(|| {
                    MigrateError::configuration(format!(
                        "{engine} {}: no version recorded in plan",
                        item.table
                    ))
                })?;
                let statement = self.build(doc, *engine, item, version)?;
                self.observer.log(
                    Level::Info,
                    if options.dry_run {
                        "dry run: would execute"
                    } else {
                        "executing"
                    },
                    &json!({
                        "run_id": run_id.to_string(),
                        "engine": engine,
                        "kind": item.kind,
                        "table": item.table,
                        "element": item.name(),
                        "statement": statement.to_string(),
                    }),
                );
                if !options.dry_run {
                    self.adapters.execute(*engine, &statement)?;
                }
                statements.push(AppliedStatement {
                    engine: *engine,
                    kind: item.kind,
                    table: item.table.clone(),
                    element: item.name().to_string(),
                    statement,
                    executed: !options.dry_run,
                });
            }
            self.observer
                .additions_applied(*engine, statements.len() - before, options.dry_run);
        }

        Ok(ApplyReport {
            run_id,
            dry_run: options.dry_run,
            additions_applied: statements.len(),
            statements,
            plan,
        })
    }

    fn build(
        &self,
        doc: &SchemaDocument,
        engine: Engine,
        item: &PlanItem,
        version: f64,
    ) -> Result<Statement> {
        if engine == Engine::Dynamodb {
            let adapter = self
                .adapters
                .wide_column()
                .ok_or_else(|| MigrateError::configuration("no dynamodb adapter configured"))?;
            let spec = wide_column_spec(doc, &item.table)?;
            return match (item.kind, item.index.as_deref()) {
                (ElementKind::Table, _) => adapter.build_create_table(&item.table, spec, version),
                (ElementKind::SecondaryIndex, Some(name)) => {
                    let gsi = spec.gsi(name).ok_or_else(|| missing(engine, item))?;
                    adapter.build_create_index(&item.table, spec, gsi)
                }
                _ => Err(missing(engine, item)),
            };
        }

        let adapter = self
            .adapters
            .relational(engine)
            .ok_or_else(|| MigrateError::configuration(format!("no {engine} adapter configured")))?;
        let spec = relational_spec(doc, engine, &item.table)?;
        match item.kind {
            ElementKind::Table => adapter.build_create_table(&item.table, spec, version),
            ElementKind::Column => {
                let column = item
                    .column
                    .as_deref()
                    .and_then(|name| spec.column(name))
                    .ok_or_else(|| missing(engine, item))?;
                adapter.build_add_column(&item.table, column)
            }
            ElementKind::Index => {
                let index = spec
                    .indexes
                    .iter()
                    .find(|index| {
                        Some(index.resolved_name(&item.table).as_str()) == item.index.as_deref()
                    })
                    .ok_or_else(|| missing(engine, item))?;
                adapter.build_create_index(&item.table, index)
            }
            ElementKind::SecondaryIndex => Err(missing(engine, item)),
        }
    }
}

fn missing(engine: Engine, item: &PlanItem) -> MigrateError {
    MigrateError::configuration(format!(
        "{engine} {} \"{}\" on \"{}\" is not in the schema document",
        item.kind,
        item.name(),
        item.table
    ))
}

fn relational_spec<'d>(
    doc: &'d SchemaDocument,
    engine: Engine,
    table: &str,
) -> Result<&'d RelationalTableSpec> {
    doc.relational(engine)
        .and_then(|schema| {
            schema
                .tables
                .iter()
                .find(|(logical, spec)| spec.physical_name(logical) == table)
        })
        .map(|(_, spec)| spec)
        .ok_or_else(|| {
            MigrateError::configuration(format!(
                "{engine} table \"{table}\" is not in the schema document"
            ))
        })
}

fn wide_column_spec<'d>(doc: &'d SchemaDocument, table: &str) -> Result<&'d WideColumnTableSpec> {
    doc.dynamodb
        .as_ref()
        .and_then(|schema| {
            schema
                .tables
                .iter()
                .find(|(logical, spec)| spec.physical_name(logical) == table)
        })
        .map(|(_, spec)| spec)
        .ok_or_else(|| {
            MigrateError::configuration(format!(
                "dynamodb table \"{table}\" is not in the schema document"
            ))
        })
}
