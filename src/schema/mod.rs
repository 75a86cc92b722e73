//! Schema document model.

pub mod document;
pub mod element;
pub mod ordered;

pub use document::{
    AttributeDefinition, AttributeSpec, AttributeType, BillingMode, ColumnSpec, GsiSpec,
    IndexSpec, NamedColumn, NativeColumn, Projection, ProjectionType, ProvisionedThroughput,
    RelationalSchema, RelationalTableSpec, SchemaDocument, TableOptions, WideColumnSchema,
    WideColumnTableSpec,
};
pub use element::{ElementKind, SchemaElement};
pub use ordered::OrderedMap;
