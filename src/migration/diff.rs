//! Schema diffing between two materialized snapshots.
//!
//! Unlike the planner this never looks at a live engine: both sides are
//! already-captured [`SchemaSnapshot`]s. Modifications and deletions are
//! reported with warnings; the migrator itself only ever adds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Tables keyed by physical name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    #[serde(default)]
    pub tables: BTreeMap<String, TableSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnSnapshot>,
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    pub data_type: String,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

fn default_nullable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// A table, column or index that exists on only one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableChange {
    Table { table: String },
    Column { table: String, column: String },
    Index { table: String, index: String },
}

impl fmt::Display for TableChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableChange::Table { table } => write!(f, "table {table}"),
            TableChange::Column { table, column } => write!(f, "column {table}.{column}"),
            TableChange::Index { table, index } => write!(f, "index {index} on {table}"),
        }
    }
}

/// A column present on both sides whose definition differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ColumnChange {
    TypeChanged {
        table: String,
        column: String,
        from: String,
        to: String,
    },
    NullabilityChanged {
        table: String,
        column: String,
        from: bool,
        to: bool,
    },
    DefaultChanged {
        table: String,
        column: String,
        from: Option<String>,
        to: Option<String>,
    },
}

impl ColumnChange {
    /// Migration-risk warning attached to every modification.
    pub fn warning(&self) -> String {
        match self {
            ColumnChange::TypeChanged {
                table,
                column,
                from,
                to,
            } => format!(
                "{table}.{column}: type change {from} -> {to} may fail or truncate existing rows"
            ),
            ColumnChange::NullabilityChanged {
                table,
                column,
                to: false,
                ..
            } => format!("{table}.{column}: NOT NULL fails while existing rows hold NULL"),
            ColumnChange::NullabilityChanged { table, column, .. } => {
                format!("{table}.{column}: dropping NOT NULL lets readers see NULL values")
            }
            ColumnChange::DefaultChanged { table, column, .. } => {
                format!("{table}.{column}: default change only applies to rows written afterwards")
            }
        }
    }
}

/// Structured difference between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDiff {
    pub additions: Vec<TableChange>,
    pub modifications: Vec<ColumnChange>,
    pub deletions: Vec<TableChange>,
}

impl SchemaDiff {
    /// Compute the changes that turn `from` into `to`.
    pub fn compute(from: &SchemaSnapshot, to: &SchemaSnapshot) -> Self {
        let mut diff = SchemaDiff::default();

        let from_names: BTreeSet<_> = from.tables.keys().collect();
        let to_names: BTreeSet<_> = to.tables.keys().collect();

        for name in to_names.difference(&from_names) {
            diff.additions.push(TableChange::Table {
                table: (*name).clone(),
            });
        }
        for name in from_names.difference(&to_names) {
            diff.deletions.push(TableChange::Table {
                table: (*name).clone(),
            });
        }
        for name in from_names.intersection(&to_names) {
            diff.diff_table(name, &from.tables[*name], &to.tables[*name]);
        }
        diff
    }

    fn diff_table(&mut self, table: &str, from: &TableSnapshot, to: &TableSnapshot) {
        let from_columns: BTreeSet<_> = from.columns.keys().collect();
        let to_columns: BTreeSet<_> = to.columns.keys().collect();

        for column in to_columns.difference(&from_columns) {
            self.additions.push(TableChange::Column {
                table: table.to_string(),
                column: (*column).clone(),
            });
        }
        for column in from_columns.difference(&to_columns) {
            self.deletions.push(TableChange::Column {
                table: table.to_string(),
                column: (*column).clone(),
            });
        }
        for column in from_columns.intersection(&to_columns) {
            self.diff_column(table, column, &from.columns[*column], &to.columns[*column]);
        }

        // An index whose definition changed is reported as dropped and re-added.
        for (index, spec) in &to.indexes {
            if from.indexes.get(index) != Some(spec) {
                self.additions.push(TableChange::Index {
                    table: table.to_string(),
                    index: index.clone(),
                });
            }
        }
        for (index, spec) in &from.indexes {
            if to.indexes.get(index) != Some(spec) {
                self.deletions.push(TableChange::Index {
                    table: table.to_string(),
                    index: index.clone(),
                });
            }
        }
    }

    fn diff_column(
        &mut self,
        table: &str,
        column: &str,
        from: &ColumnSnapshot,
        to: &ColumnSnapshot,
    ) {
        if !from.data_type.eq_ignore_ascii_case(&to.data_type) {
            self.modifications.push(ColumnChange::TypeChanged {
                table: table.to_string(),
                column: column.to_string(),
                from: from.data_type.clone(),
                to: to.data_type.clone(),
            });
        }
        if from.nullable != to.nullable {
            self.modifications.push(ColumnChange::NullabilityChanged {
                table: table.to_string(),
                column: column.to_string(),
                from: from.nullable,
                to: to.nullable,
            });
        }
        if from.default != to.default {
            self.modifications.push(ColumnChange::DefaultChanged {
                table: table.to_string(),
                column: column.to_string(),
                from: from.default.clone(),
                to: to.default.clone(),
            });
        }
    }

    /// No modifications and no deletions.
    pub fn is_safe(&self) -> bool {
        self.modifications.is_empty() && self.deletions.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.is_safe()
    }

    pub fn change_count(&self) -> usize {
        self.additions.len() + self.modifications.len() + self.deletions.len()
    }

    /// One warning per modification and per deletion.
    pub fn warnings(&self) -> Vec<String> {
        self.modifications
            .iter()
            .map(ColumnChange::warning)
            .chain(
                self.deletions
                    .iter()
                    .map(|d| format!("{d} was removed; dropping it requires manual action")),
            )
            .collect()
    }
}
