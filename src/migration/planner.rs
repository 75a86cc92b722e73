//! Planning pass: classify every element against its table version and
//! probe which active elements are missing. Read-only.

use super::adapters::Adapters;
use super::plan::{version_label, EnginePlan, Plan, PlanItem, PlanMeta, PlanOptions};
use super::{engine_tables, TableElements};
use crate::engine::Engine;
use crate::error::Result;
use crate::lifecycle::Phase;
use crate::observer::Observer;
use crate::schema::{ElementKind, SchemaDocument};
use crate::version::{resolve_version, VersionSource};
use chrono::Utc;
use log::Level;
use serde_json::json;
use std::collections::BTreeMap;

pub struct SchemaPlanner<'a> {
    adapters: &'a Adapters,
    versions: &'a dyn VersionSource,
    observer: &'a dyn Observer,
}

impl<'a> SchemaPlanner<'a> {
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

    /// Compute the plan for every targeted engine the document declares.
    ///
    /// Engines are visited postgres, mysql, dynamodb. An engine without a
    /// configured adapter is skipped.
    pub fn plan(&self, doc: &SchemaDocument, options: &PlanOptions) -> Result<Plan> {
        doc.validate()?;

        let mut engines = BTreeMap::new();
        let mut versions = BTreeMap::new();
        let mut targets = Vec::new();

        for engine in Engine::ALL {
            if !options.includes(engine) {
                continue;
            }
            let Some(tables) = engine_tables(doc, engine) else {
                continue;
            };
            if !self.adapters.has(engine) {
                self.observer.log(
                    Level::Debug,
                    "skipping engine without adapter",
                    &json!({ "engine": engine }),
                );
                continue;
            }

            let mut plan = EnginePlan::default();
            for table in &tables {
                self.plan_table(engine, table, &mut plan, &mut versions)?;
            }
            self.observer.log(
                Level::Info,
                "planned schema changes",
                &json!({
                    "engine": engine,
                    "additions": plan.additions.len(),
                    "removals_to_report": plan.removals_to_report.len(),
                    "future_items": plan.future_items.len(),
                }),
            );
            for item in &plan.removals_to_report {
                self.observer.log(
                    Level::Warn,
                    "element is past its removed_in version; drop it manually",
                    &json!({
                        "engine": engine,
                        "kind": item.kind,
                        "table": item.table,
                        "name": item.name(),
                        "reason": item.reason,
                    }),
                );
            }
            targets.push(engine);
            engines.insert(engine, plan);
        }

        Ok(Plan {
            engines,
            meta: PlanMeta {
                targets,
                versions,
                generated_at: Utc::now(),
                document_checksum: doc.checksum(),
            },
        })
    }

    fn plan_table(
        &self,
        engine: Engine,
        elements: &TableElements<'_>,
        plan: &mut EnginePlan,
        versions: &mut BTreeMap<String, f64>,
    ) -> Result<()> {
        let table = &elements.table;
        let version = resolve_version(self.versions, engine, table.table())?;
        versions.insert(version_label(engine, table.table()), version);

        let classification = table.classify(version)?;
        match classification.phase() {
            Phase::Future => {
                plan.future_items
                    .push(PlanItem::from_element(table, classification.reason()));
                return Ok(());
            }
            Phase::RemoveNow => {
                plan.removals_to_report
                    .push(PlanItem::from_element(table, classification.reason()));
                return Ok(());
            }
            Phase::Active => {}
        }

        let exists = self.adapters.exists(table)?;
        let mut additions = Vec::new();
        let mut bundled = Vec::new();

        for child in &elements.children {
            let classification = child.classify(version)?;
            match classification.phase() {
                // Nothing to report about children of a table that is not there yet.
                Phase::Future | Phase::RemoveNow if !exists => {}
                Phase::Future => plan
                    .future_items
                    .push(PlanItem::from_element(child, classification.reason())),
                Phase::RemoveNow => plan
                    .removals_to_report
                    .push(PlanItem::from_element(child, classification.reason())),
                Phase::Active if exists => {
                    if !self.adapters.exists(child)? {
                        additions.push(PlanItem::from_element(child, None));
                    }
                }
                // The table is missing: its CREATE covers active columns and,
                // on the wide-column engine, active secondary indexes.
                Phase::Active => match child.kind() {
                    ElementKind::Column => {}
                    ElementKind::SecondaryIndex => bundled.push(child.name().to_string()),
                    _ => additions.push(PlanItem::from_element(child, None)),
                },
            }
        }

        if !exists {
            plan.additions
                .push(PlanItem::from_element(table, None).with_bundled_indexes(bundled));
        }
        plan.additions.extend(additions);
        Ok(())
    }
}
