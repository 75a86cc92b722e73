//! Uniform view over the elements of a schema document.

use super::document::{RelationalTableSpec, WideColumnTableSpec};
use crate::engine::Engine;
use crate::error::Result;
use crate::lifecycle::{classify, Classification, HasLifecycle, LifecycleContext, Markers};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a schema element, as recorded in plans and check records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Table,
    Column,
    Index,
    SecondaryIndex,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Table => "table",
            ElementKind::Column => "column",
            ElementKind::Index => "index",
            ElementKind::SecondaryIndex => "global secondary index",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A table, column, index or secondary index borrowed from a document.
///
/// `table` is always the owning table's physical name; `name` is the
/// element's own physical name (equal to `table` for tables).
#[derive(Debug, Clone)]
pub enum SchemaElement<'a> {
    Table {
        engine: Engine,
        logical: &'a str,
        table: &'a str,
        markers: Markers<'a>,
    },
    Column {
        engine: Engine,
        table: &'a str,
        name: &'a str,
        markers: Markers<'a>,
    },
    Index {
        engine: Engine,
        table: &'a str,
        name: String,
        markers: Markers<'a>,
    },
    SecondaryIndex {
        engine: Engine,
        table: &'a str,
        name: &'a str,
        markers: Markers<'a>,
    },
}

impl<'a> SchemaElement<'a> {
    /// A relational table element.
    pub fn relational_table(
        engine: Engine,
        logical: &'a str,
        spec: &'a RelationalTableSpec,
    ) -> Self {
        SchemaElement::Table {
            engine,
            logical,
            table: spec.physical_name(logical),
            markers: spec.markers(),
        }
    }

    /// Columns then indexes of a relational table, in document order.
    pub fn relational_children(
        engine: Engine,
        table: &'a str,
        spec: &'a RelationalTableSpec,
    ) -> Vec<Self> {
        let columns = spec.columns.iter().map(|(key, column)| SchemaElement::Column {
            engine,
            table,
            name: column.name.as_deref().unwrap_or(key),
            markers: Markers::new(column.since.as_ref(), column.removed_in.as_ref()),
        });
        let indexes = spec.indexes.iter().map(|index| SchemaElement::Index {
            engine,
            table,
            name: index.resolved_name(table),
            markers: index.markers(),
        });
        columns.chain(indexes).collect()
    }

    pub fn wide_column_table(logical: &'a str, spec: &'a WideColumnTableSpec) -> Self {
        SchemaElement::Table {
            engine: Engine::Dynamodb,
            logical,
            table: spec.physical_name(logical),
            markers: spec.markers(),
        }
    }

    /// Global secondary indexes of a wide-column table.
    pub fn wide_column_children(table: &'a str, spec: &'a WideColumnTableSpec) -> Vec<Self> {
        spec.global_secondary_indexes
            .iter()
            .map(|gsi| SchemaElement::SecondaryIndex {
                engine: Engine::Dynamodb,
                table,
                name: gsi.index_name.as_str(),
                markers: gsi.markers(),
            })
            .collect()
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            SchemaElement::Table { .. } => ElementKind::Table,
            SchemaElement::Column { .. } => ElementKind::Column,
            SchemaElement::Index { .. } => ElementKind::Index,
            SchemaElement::SecondaryIndex { .. } => ElementKind::SecondaryIndex,
        }
    }

    pub fn engine(&self) -> Engine {
        match self {
            SchemaElement::Table { engine, .. }
            | SchemaElement::Column { engine, .. }
            | SchemaElement::Index { engine, .. }
            | SchemaElement::SecondaryIndex { engine, .. } => *engine,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            SchemaElement::Table { table, .. }
            | SchemaElement::Column { table, .. }
            | SchemaElement::Index { table, .. }
            | SchemaElement::SecondaryIndex { table, .. } => *table,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SchemaElement::Table { table, .. } => *table,
            SchemaElement::Column { name, .. }
            | SchemaElement::SecondaryIndex { name, .. } => *name,
            SchemaElement::Index { name, .. } => name.as_str(),
        }
    }

    pub fn markers(&self) -> Markers<'a> {
        match self {
            SchemaElement::Table { markers, .. }
            | SchemaElement::Column { markers, .. }
            | SchemaElement::Index { markers, .. }
            | SchemaElement::SecondaryIndex { markers, .. } => *markers,
        }
    }

    /// Column name for column elements.
    pub fn column(&self) -> Option<&str> {
        match self {
            SchemaElement::Column { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Index name for index and secondary index elements.
    pub fn index(&self) -> Option<&str> {
        match self {
            SchemaElement::Index { name, .. } => Some(name.as_str()),
            SchemaElement::SecondaryIndex { name, .. } => Some(*name),
            _ => None,
        }
    }

    /// Classify against the owning table's version.
    pub fn classify(&self, version: f64) -> Result<Classification> {
        let ctx = LifecycleContext::new(self.engine(), self.table(), self.name(), version);
        classify(self.markers(), &ctx)
    }
}

impl fmt::Display for SchemaElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaElement::Table { engine, table, .. } => write!(f, "{engine} table \"{table}\""),
            other => write!(
                f,
                "{} {} \"{}\" on \"{}\"",
                other.engine(),
                other.kind(),
                other.name(),
                other.table()
            ),
        }
    }
}
