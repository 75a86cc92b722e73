//! Validation pass: every element active at its table version must exist.

use super::adapters::Adapters;
use super::plan::PlanOptions;
use super::planner::SchemaPlanner;
use super::{engine_tables, TableElements};
use crate::engine::Engine;
use crate::error::{MigrateError, Result};
use crate::observer::Observer;
use crate::schema::{ElementKind, SchemaDocument, SchemaElement};
use crate::version::VersionSource;
use log::Level;
use serde::Serialize;
use serde_json::json;

/// Outcome of probing one active element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementCheck {
    pub engine: Engine,
    pub kind: ElementKind,
    pub table: String,
    pub name: String,
    pub exists: bool,
}

impl ElementCheck {
    fn new(element: &SchemaElement<'_>, exists: bool) -> Self {
        Self {
            engine: element.engine(),
            kind: element.kind(),
            table: element.table().to_string(),
            name: element.name().to_string(),
            exists,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub checks: Vec<ElementCheck>,
    /// One message per active element that is missing.
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, element: &SchemaElement<'_>, exists: bool) {
        if !exists {
            self.errors.push(format!("missing active {element}"));
        }
        self.checks.push(ElementCheck::new(element, exists));
    }
}

pub struct SchemaValidator<'a> {
    adapters: &'a Adapters,
    versions: &'a dyn VersionSource,
    observer: &'a dyn Observer,
}

impl<'a> SchemaValidator<'a> {
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

    /// Probe every active element of the planned engines.
    ///
    /// Fails with [`MigrateError::ValidationFailed`] carrying every message
    /// and every check when at least one active element is missing.
    pub fn validate(
        &self,
        doc: &SchemaDocument,
        options: &PlanOptions,
    ) -> Result<ValidationResult> {
        let plan =
            SchemaPlanner::new(self.adapters, self.versions, self.observer).plan(doc, options)?;
        self.adapters.invalidate_caches();

        let mut result = ValidationResult::default();
        for engine in &plan.meta.targets {
            let Some(tables) = engine_tables(doc, *engine) else {
                continue;
            };
            for elements in &tables {
                let Some(version) = plan.version(*engine, elements.table.table()) else {
                    continue;
                };
                self.check_table(elements, version, &mut result)?;
            }
        }

        let failures = result.errors.len();
        self.observer
            .validation_finished(result.passed(), result.checks.len(), failures);
        if !result.passed() {
            for error in &result.errors {
                self.observer.log(Level::Error, error, &json!(null));
            }
            return Err(MigrateError::ValidationFailed {
                errors: result.errors,
                checks: result.checks,
            });
        }
        Ok(result)
    }

    fn check_table(
        &self,
        elements: &TableElements<'_>,
        version: f64,
        result: &mut ValidationResult,
    ) -> Result<()> {
        if !elements.table.classify(version)?.active {
            return Ok(());
        }
        let exists = self.adapters.exists(&elements.table)?;
        result.record(&elements.table, exists);
        if !exists {
            return Ok(());
        }
        for child in &elements.children {
            if child.classify(version)?.active {
                let exists = self.adapters.exists(child)?;
                result.record(child, exists);
            }
        }
        Ok(())
    }
}
