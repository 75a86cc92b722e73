//! Planning, applying and validating additive schema changes.
//!
//! # Example
//!
//! ```rust,no_run
//! use schemaguard::adapter::PostgresAdapter;
//! use schemaguard::driver::PostgresDriver;
//! use schemaguard::migration::{ApplyOptions, PlanOptions, SchemaMigrator};
//! use schemaguard::schema::SchemaDocument;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = Arc::new(PostgresDriver::connect("postgres://app@localhost/app")?);
//! let migrator = SchemaMigrator::new().with_postgres(PostgresAdapter::new(driver));
//!
//! let doc = SchemaDocument::from_path("schema.json")?;
//! let report = migrator.apply_schema(&doc, &ApplyOptions::default())?;
//! println!("{} addition(s) applied", report.additions_applied);
//! migrator.final_validate(&doc, &PlanOptions::all())?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod applier;
pub mod diff;
pub mod migrator;
pub mod plan;
pub mod planner;
pub mod validator;

pub use adapters::Adapters;
pub use applier::{AppliedStatement, ApplyReport, SchemaApplier};
pub use diff::{
    ColumnChange, ColumnSnapshot, IndexSnapshot, SchemaDiff, SchemaSnapshot, TableChange,
    TableSnapshot,
};
pub use migrator::SchemaMigrator;
pub use plan::{ApplyOptions, EnginePlan, Plan, PlanItem, PlanMeta, PlanOptions};
pub use planner::SchemaPlanner;
pub use validator::{ElementCheck, SchemaValidator, ValidationResult};

use crate::engine::Engine;
use crate::schema::{SchemaDocument, SchemaElement};

/// A table element and its columns, indexes or secondary indexes.
pub(crate) struct TableElements<'a> {
    pub table: SchemaElement<'a>,
    pub children: Vec<SchemaElement<'a>>,
}

/// Tables the document declares for `engine`, in document order; `None`
/// when the document has no section for the engine.
pub(crate) fn engine_tables(
    doc: &SchemaDocument,
    engine: Engine,
) -> Option<Vec<TableElements<'_>>> {
    if engine == Engine::Dynamodb {
        let schema = doc.dynamodb.as_ref()?;
        return Some(
            schema
                .tables
                .iter()
                .map(|(logical, spec)| TableElements {
                    table: SchemaElement::wide_column_table(logical, spec),
                    children: SchemaElement::wide_column_children(
                        spec.physical_name(logical),
                        spec,
                    ),
                })
                .collect(),
        );
    }

    let schema = doc.relational(engine)?;
    Some(
        schema
            .tables
            .iter()
            .map(|(logical, spec)| TableElements {
                table: SchemaElement::relational_table(engine, logical, spec),
                children: SchemaElement::relational_children(
                    engine,
                    spec.physical_name(logical),
                    spec,
                ),
            })
            .collect(),
    )
}
