//! Plan data: what is missing, what would be removed, what is not yet due.

use crate::engine::Engine;
use crate::schema::{ElementKind, SchemaElement};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One element recorded in a plan bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanItem {
    pub kind: ElementKind,
    /// Physical table name.
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// `since=..` for future items, `removed_in=..` for removals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Secondary indexes created together with a wide-column table.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bundled_indexes: Vec<String>,
}

impl PlanItem {
    pub fn from_element(element: &SchemaElement<'_>, reason: Option<String>) -> Self {
        Self {
            kind: element.kind(),
            table: element.table().to_string(),
            column: element.column().map(str::to_string),
            index: element.index().map(str::to_string),
            reason,
            bundled_indexes: Vec::new(),
        }
    }

    pub fn with_bundled_indexes(mut self, indexes: Vec<String>) -> Self {
        self.bundled_indexes = indexes;
        self
    }

    /// Column or index name; the table name for table items.
    pub fn name(&self) -> &str {
        self.column
            .as_deref()
            .or(self.index.as_deref())
            .unwrap_or(&self.table)
    }
}

/// Plan buckets for one engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnginePlan {
    pub additions: Vec<PlanItem>,
    pub removals_to_report: Vec<PlanItem>,
    pub future_items: Vec<PlanItem>,
}

impl EnginePlan {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty()
            && self.removals_to_report.is_empty()
            && self.future_items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanMeta {
    /// Engines that were planned, in planning order.
    pub targets: Vec<Engine>,
    /// Table version used for each `engine:table`.
    pub versions: BTreeMap<String, f64>,
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the canonical document JSON.
    pub document_checksum: String,
}

/// Output of a planning pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub engines: BTreeMap<Engine, EnginePlan>,
    pub meta: PlanMeta,
}

impl Plan {
    pub fn engine(&self, engine: Engine) -> Option<&EnginePlan> {
        self.engines.get(&engine)
    }

    /// Every addition, engines in planning order.
    pub fn additions(&self) -> impl Iterator<Item = (Engine, &PlanItem)> {
        self.engines
            .iter()
            .flat_map(|(engine, plan)| plan.additions.iter().map(move |item| (*engine, item)))
    }

    pub fn addition_count(&self) -> usize {
        self.engines.values().map(|p| p.additions.len()).sum()
    }

    /// Version recorded for a physical table during planning.
    pub fn version(&self, engine: Engine, table: &str) -> Option<f64> {
        self.meta.versions.get(&version_label(engine, table)).copied()
    }
}

pub(crate) fn version_label(engine: Engine, table: &str) -> String {
    format!("{engine}:{table}")
}

/// Options for planning and validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Engines to visit; `None` means every engine the document declares.
    pub targets: Option<Vec<Engine>>,
}

impl PlanOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(engines: &[Engine]) -> Self {
        Self {
            targets: Some(engines.to_vec()),
        }
    }

    pub fn includes(&self, engine: Engine) -> bool {
        self.targets
            .as_ref()
            .map_or(true, |targets| targets.contains(&engine))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub targets: Option<Vec<Engine>>,
    /// Build and log statements without executing them.
    pub dry_run: bool,
}

impl ApplyOptions {
    pub fn dry_run() -> Self {
        Self {
            targets: None,
            dry_run: true,
        }
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            targets: self.targets.clone(),
        }
    }
}
