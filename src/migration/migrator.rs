//! SchemaMigrator - public entry point for plan, apply and validate passes

use super::adapters::Adapters;
use super::applier::{ApplyReport, SchemaApplier};
use super::plan::{ApplyOptions, Plan, PlanOptions};
use super::planner::SchemaPlanner;
use super::validator::{SchemaValidator, ValidationResult};
use crate::adapter::{RelationalAdapter, WideColumnAdapter};
use crate::config::SchemaguardConfig;
use crate::error::Result;
use crate::observer::Observer;
use crate::schema::SchemaDocument;
use crate::version::{EnvVersions, VersionSource};
use std::sync::Arc;

/// Orchestrates the three passes over the configured engine adapters.
///
/// The document and table versions are read fresh on every call; only the
/// adapters' existence caches survive between calls. Callers must not run
/// two mutating passes against the same tables concurrently.
pub struct SchemaMigrator {
    adapters: Adapters,
    versions: Box<dyn VersionSource + Send + Sync>,
    observer: Arc<dyn Observer>,
}

impl Default for SchemaMigrator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaMigrator {
    /// A migrator with no adapters, environment versions and the default
    /// observer (metrics-recording when the `metrics` feature is on).
    pub fn new() -> Self {
        Self {
            adapters: Adapters::default(),
            versions: Box::new(EnvVersions),
            observer: default_observer(),
        }
    }

    /// Use the versions from a loaded configuration, falling back to the
    /// environment for tables the configuration does not mention. Build the
    /// adapters with their `from_config` constructors so they pick up the
    /// retry and cache settings too.
    pub fn from_config(config: &SchemaguardConfig) -> Self {
        Self::new().with_versions(config.version_source())
    }

    pub fn with_postgres(mut self, adapter: impl RelationalAdapter + 'static) -> Self {
        self.adapters.postgres = Some(Box::new(adapter));
        self
    }

    pub fn with_mysql(mut self, adapter: impl RelationalAdapter + 'static) -> Self {
        self.adapters.mysql = Some(Box::new(adapter));
        self
    }

    pub fn with_dynamodb(mut self, adapter: impl WideColumnAdapter + 'static) -> Self {
        self.adapters.dynamodb = Some(Box::new(adapter));
        self
    }

    pub fn with_versions(mut self, versions: impl VersionSource + Send + Sync + 'static) -> Self {
        self.versions = Box::new(versions);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn adapters(&self) -> &Adapters {
        &self.adapters
    }

    /// Classify every element and probe which active ones are missing.
    /// Never mutates engine state.
    pub fn plan_schema_changes(&self, doc: &SchemaDocument, options: &PlanOptions) -> Result<Plan> {
        #[cfg(feature = "tracing")]
        let _span =
            crate::observer::tracing_helpers::plan_span(targets(&options.targets)).entered();

        SchemaPlanner::new(&self.adapters, self.versions.as_ref(), self.observer.as_ref())
            .plan(doc, options)
    }

    /// Recompute the plan and create everything it lists as missing.
    pub fn apply_schema(
        &self,
        doc: &SchemaDocument,
        options: &ApplyOptions,
    ) -> Result<ApplyReport> {
        #[cfg(feature = "tracing")]
        let _span =
            crate::observer::tracing_helpers::apply_span(targets(&options.targets), options.dry_run)
                .entered();

        SchemaApplier::new(&self.adapters, self.versions.as_ref(), self.observer.as_ref())
            .apply(doc, options)
    }

    /// Check that every active element physically exists.
    pub fn final_validate(
        &self,
        doc: &SchemaDocument,
        options: &PlanOptions,
    ) -> Result<ValidationResult> {
        #[cfg(feature = "tracing")]
        let _span =
            crate::observer::tracing_helpers::validate_span(targets(&options.targets)).entered();

        SchemaValidator::new(&self.adapters, self.versions.as_ref(), self.observer.as_ref())
            .validate(doc, options)
    }
}

#[cfg(feature = "tracing")]
fn targets(targets: &Option<Vec<crate::engine::Engine>>) -> &[crate::engine::Engine] {
    targets.as_deref().unwrap_or(&crate::engine::Engine::ALL)
}

#[cfg(feature = "metrics")]
fn default_observer() -> Arc<dyn Observer> {
    Arc::new(crate::observer::MetricsObserver::default())
}

#[cfg(not(feature = "metrics"))]
fn default_observer() -> Arc<dyn Observer> {
    Arc::new(crate::observer::LogObserver)
}
