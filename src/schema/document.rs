//! Declarative schema document.
//!
//! ```json
//! {
//!   "postgres": { "tables": { "users": { "columns": { "id": { "type": "uuid", "primary": true } } } } },
//!   "mysql":    { "tables": { ... } },
//!   "dynamodb": { "tables": { "sessions": { "PK": "id", "GlobalSecondaryIndexes": [ ... ] } } }
//! }
//! ```
//!
//! Relational and wide-column tables are distinct types; every column, index
//! and secondary index may carry `since` / `removed_in` markers and a
//! `native` override that wins over generic type mapping.

use super::ordered::OrderedMap;
use crate::engine::Engine;
use crate::error::{MigrateError, Result};
use crate::lifecycle::{HasLifecycle, Markers, RawVersion};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// The whole document: one optional section per engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postgres: Option<RelationalSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql: Option<RelationalSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamodb: Option<WideColumnSchema>,
}

impl SchemaDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| MigrateError::Document(format!("invalid schema document: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Document(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    /// The relational section for `engine`, if any.
    pub fn relational(&self, engine: Engine) -> Option<&RelationalSchema> {
        match engine {
            Engine::Postgres => self.postgres.as_ref(),
            Engine::Mysql => self.mysql.as_ref(),
            Engine::Dynamodb => None,
        }
    }

    /// SHA-256 of the canonical JSON form, recorded in plan metadata.
    pub fn checksum(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        format!("{:x}", Sha256::digest(canonical.as_bytes()))
    }

    /// Reject documents that are structurally valid JSON but cannot be
    /// migrated (missing keys, bad billing configuration, duplicate names).
    pub fn validate(&self) -> Result<()> {
        for engine in [Engine::Postgres, Engine::Mysql] {
            if let Some(schema) = self.relational(engine) {
                for (name, table) in schema.tables.iter() {
                    table.validate(engine, name)?;
                }
            }
        }
        if let Some(schema) = &self.dynamodb {
            for (name, table) in schema.tables.iter() {
                table.validate(name)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Relational engines
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalSchema {
    #[serde(default)]
    pub tables: OrderedMap<RelationalTableSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalTableSpec {
    /// Physical table name when it differs from the document key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub columns: OrderedMap<ColumnSpec>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    /// Composite primary key; single-column keys may use `primary` instead.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub options: TableOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<RawVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_in: Option<RawVersion>,
}

impl RelationalTableSpec {
    pub fn physical_name<'a>(&'a self, logical: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(logical)
    }

    pub fn markers(&self) -> Markers<'_> {
        Markers::new(self.since.as_ref(), self.removed_in.as_ref())
    }

    /// Columns paired with their document keys, in document order.
    pub fn named_columns(&self) -> Vec<NamedColumn<'_>> {
        self.columns
            .iter()
            .map(|(key, spec)| NamedColumn { key, spec })
            .collect()
    }

    /// Find a column by physical name.
    pub fn column(&self, physical: &str) -> Option<NamedColumn<'_>> {
        self.columns
            .iter()
            .map(|(key, spec)| NamedColumn { key, spec })
            .find(|c| c.physical_name() == physical)
    }

    fn validate(&self, engine: Engine, logical: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for column in self.named_columns() {
            if column.spec.column_type.trim().is_empty() {
                return Err(MigrateError::configuration(format!(
                    "{engine} {logical}.{}: column type must not be empty",
                    column.key
                )));
            }
            if !seen.insert(column.physical_name().to_string()) {
                return Err(MigrateError::configuration(format!(
                    "{engine} {logical}: duplicate physical column '{}'",
                    column.physical_name()
                )));
            }
        }
        for pk in &self.primary_key {
            if !seen.contains(pk.as_str()) {
                return Err(MigrateError::configuration(format!(
                    "{engine} {logical}: primary_key references unknown column '{pk}'"
                )));
            }
        }
        for index in &self.indexes {
            if index.columns.is_empty() {
                return Err(MigrateError::configuration(format!(
                    "{engine} {logical}: index '{}' has no columns",
                    index.label()
                )));
            }
        }
        Ok(())
    }
}

/// MySQL table options; ignored by PostgreSQL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collate: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Generic (`string`, `int`, `timestamp`) or native (`jsonb`, `VARCHAR(64)`) type.
    #[serde(rename = "type")]
    pub column_type: String,
    /// Physical column name when it differs from the document key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Defaults to nullable unless the column is a primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<RawVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_in: Option<RawVersion>,
}

impl ColumnSpec {
    pub fn new(column_type: impl Into<String>) -> Self {
        Self {
            column_type: column_type.into(),
            ..Default::default()
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(!self.primary)
    }

    /// The default to render, native override first.
    pub fn effective_default(&self) -> Option<serde_json::Value> {
        self.native
            .as_ref()
            .and_then(|n| n.default.clone())
            .map(serde_json::Value::String)
            .or_else(|| self.default.clone())
    }
}

/// Engine-native column override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeColumn {
    /// Native type emitted as-is; must belong to the engine's native type set.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub native_type: Option<String>,
    /// Default expression replacing the generic `default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A column spec together with its document key.
#[derive(Debug, Clone, Copy)]
pub struct NamedColumn<'a> {
    pub key: &'a str,
    pub spec: &'a ColumnSpec,
}

impl<'a> NamedColumn<'a> {
    pub fn physical_name(&self) -> &'a str {
        self.spec.name.as_deref().unwrap_or(self.key)
    }
}

impl HasLifecycle for NamedColumn<'_> {
    fn markers(&self) -> Markers<'_> {
        Markers::new(self.spec.since.as_ref(), self.spec.removed_in.as_ref())
    }

    fn lifecycle_label(&self) -> String {
        format!("column {}", self.key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name; derived from table and columns when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<RawVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_in: Option<RawVersion>,
}

impl IndexSpec {
    pub fn on(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Explicit name or the derived `<table>_<columns>_idx`.
    pub fn resolved_name(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| crate::ident::default_index_name(table, &self.columns))
    }

    fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("({})", self.columns.join(", ")))
    }
}

impl HasLifecycle for IndexSpec {
    fn markers(&self) -> Markers<'_> {
        Markers::new(self.since.as_ref(), self.removed_in.as_ref())
    }

    fn lifecycle_label(&self) -> String {
        format!("index {}", self.label())
    }
}

// ============================================================================
// Wide-column engine
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WideColumnSchema {
    #[serde(default)]
    pub tables: OrderedMap<WideColumnTableSpec>,
}

/// Storage type of a wide-column key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "B")]
    Binary,
}

impl AttributeType {
    pub fn code(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }

    /// Map a native code or common type name onto the three storage types.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "s" | "string" | "str" | "text" | "varchar" | "char" | "uuid" | "email" | "date"
            | "datetime" | "timestamp" | "timestamptz" | "json" | "enum" => {
                Some(AttributeType::String)
            }
            "n" | "number" | "numeric" | "int" | "integer" | "bigint" | "smallint" | "float"
            | "double" | "decimal" | "epoch" | "i32" | "i64" | "u32" | "u64" | "f32" | "f64" => {
                Some(AttributeType::Number)
            }
            "b" | "binary" | "bytes" | "blob" | "bytea" => Some(AttributeType::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BillingMode {
    #[default]
    #[serde(rename = "PAY_PER_REQUEST")]
    PayPerRequest,
    #[serde(rename = "PROVISIONED")]
    Provisioned,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::PayPerRequest => "PAY_PER_REQUEST",
            BillingMode::Provisioned => "PROVISIONED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedThroughput {
    #[serde(rename = "ReadCapacityUnits")]
    pub read_capacity_units: u64,
    #[serde(rename = "WriteCapacityUnits")]
    pub write_capacity_units: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(rename = "AttributeName")]
    pub attribute_name: String,
    #[serde(rename = "AttributeType")]
    pub attribute_type: String,
}

/// Attribute described either by a bare type name or by `{ "type": .. }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeSpec {
    Type(String),
    Detailed {
        #[serde(rename = "type")]
        attribute_type: String,
    },
}

impl AttributeSpec {
    pub fn type_name(&self) -> &str {
        match self {
            AttributeSpec::Type(t) => t,
            AttributeSpec::Detailed { attribute_type } => attribute_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProjectionType {
    #[default]
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "KEYS_ONLY")]
    KeysOnly,
    #[serde(rename = "INCLUDE")]
    Include,
}

impl ProjectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectionType::All => "ALL",
            ProjectionType::KeysOnly => "KEYS_ONLY",
            ProjectionType::Include => "INCLUDE",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    #[serde(rename = "ProjectionType", default)]
    pub projection_type: ProjectionType,
    #[serde(rename = "NonKeyAttributes", default, skip_serializing_if = "Vec::is_empty")]
    pub non_key_attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsiSpec {
    #[serde(rename = "IndexName")]
    pub index_name: String,
    #[serde(rename = "PK")]
    pub partition_key: String,
    #[serde(rename = "SK", default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    #[serde(rename = "Projection", default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    #[serde(rename = "ProvisionedThroughput", default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<RawVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_in: Option<RawVersion>,
}

impl GsiSpec {
    pub fn new(index_name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            partition_key: partition_key.into(),
            sort_key: None,
            projection: None,
            provisioned_throughput: None,
            since: None,
            removed_in: None,
        }
    }

    /// Key attributes in key-schema order (partition, then sort).
    pub fn key_attributes(&self) -> Vec<&str> {
        let mut keys = vec![self.partition_key.as_str()];
        if let Some(sk) = &self.sort_key {
            keys.push(sk.as_str());
        }
        keys
    }
}

impl HasLifecycle for GsiSpec {
    fn markers(&self) -> Markers<'_> {
        Markers::new(self.since.as_ref(), self.removed_in.as_ref())
    }

    fn lifecycle_label(&self) -> String {
        format!("global secondary index {}", self.index_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideColumnTableSpec {
    /// Physical table name when it differs from the document key.
    #[serde(rename = "TableName", default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(rename = "PK")]
    pub partition_key: String,
    #[serde(rename = "SK", default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    /// Explicit per-attribute definitions; highest priority when resolving types.
    #[serde(rename = "AttributeDefinitions", default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_definitions: Vec<AttributeDefinition>,
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub attributes: OrderedMap<AttributeSpec>,
    #[serde(default, skip_serializing_if = "OrderedMap::is_empty")]
    pub columns: OrderedMap<AttributeSpec>,
    /// Per-table override map consulted after attributes/columns.
    #[serde(rename = "AttributeTypes", default, skip_serializing_if = "OrderedMap::is_empty")]
    pub attribute_types: OrderedMap<String>,
    #[serde(rename = "GlobalSecondaryIndexes", default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GsiSpec>,
    #[serde(rename = "BillingMode", default, skip_serializing_if = "Option::is_none")]
    pub billing_mode: Option<BillingMode>,
    #[serde(rename = "ProvisionedThroughput", default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<RawVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_in: Option<RawVersion>,
}

impl WideColumnTableSpec {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            table_name: None,
            partition_key: partition_key.into(),
            sort_key: None,
            attribute_definitions: Vec::new(),
            attributes: OrderedMap::new(),
            columns: OrderedMap::new(),
            attribute_types: OrderedMap::new(),
            global_secondary_indexes: Vec::new(),
            billing_mode: None,
            provisioned_throughput: None,
            since: None,
            removed_in: None,
        }
    }

    pub fn physical_name<'a>(&'a self, logical: &'a str) -> &'a str {
        self.table_name.as_deref().unwrap_or(logical)
    }

    pub fn markers(&self) -> Markers<'_> {
        Markers::new(self.since.as_ref(), self.removed_in.as_ref())
    }

    pub fn gsi(&self, name: &str) -> Option<&GsiSpec> {
        self.global_secondary_indexes
            .iter()
            .find(|g| g.index_name == name)
    }

    /// Table key attributes in key-schema order.
    pub fn key_attributes(&self) -> Vec<&str> {
        let mut keys = vec![self.partition_key.as_str()];
        if let Some(sk) = &self.sort_key {
            keys.push(sk.as_str());
        }
        keys
    }

    fn validate(&self, logical: &str) -> Result<()> {
        if self.partition_key.trim().is_empty() {
            return Err(MigrateError::configuration(format!(
                "dynamodb {logical}: PK must not be empty"
            )));
        }
        if self.billing_mode == Some(BillingMode::Provisioned)
            && self.provisioned_throughput.is_none()
        {
            return Err(MigrateError::configuration(format!(
                "dynamodb {logical}: BillingMode PROVISIONED requires ProvisionedThroughput"
            )));
        }
        let mut names = HashSet::new();
        for gsi in &self.global_secondary_indexes {
            if gsi.index_name.trim().is_empty() || gsi.partition_key.trim().is_empty() {
                return Err(MigrateError::configuration(format!(
                    "dynamodb {logical}: global secondary indexes need IndexName and PK"
                )));
            }
            if !names.insert(gsi.index_name.as_str()) {
                return Err(MigrateError::configuration(format!(
                    "dynamodb {logical}: duplicate global secondary index '{}'",
                    gsi.index_name
                )));
            }
            if self.billing_mode == Some(BillingMode::Provisioned)
                && gsi.provisioned_throughput.is_none()
            {
                return Err(MigrateError::configuration(format!(
                    "dynamodb {logical}.{}: PROVISIONED tables require ProvisionedThroughput on every index",
                    gsi.index_name
                )));
            }
        }
        Ok(())
    }
}
