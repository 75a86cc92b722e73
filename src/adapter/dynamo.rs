//! Wide-column (DynamoDB-style) adapter.
//!
//! Existence is read from one `DescribeTable` request. A table answered with
//! `ResourceNotFoundException` is absent; every other failure propagates.
//! Only key attributes are ever declared: the table keys plus the keys of
//! the global secondary indexes being created.

use super::cache::{CacheKey, ExistenceCache};
use super::{SchemaAdapter, Statement, WideColumnAdapter};
use crate::config::SchemaguardConfig;
use crate::driver::WideColumnDriver;
use crate::engine::Engine;
use crate::error::{ErrorContext, MigrateError, Result};
use crate::lifecycle::partition;
use crate::retry::RetryPolicy;
use crate::schema::{
    AttributeType, BillingMode, ElementKind, GsiSpec, ProjectionType, ProvisionedThroughput,
    WideColumnTableSpec,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

/// Name words that mark an identifier or text attribute. They win over
/// [`NUMERIC_WORDS`], so `phoneNumber` stays a string.
const STRING_WORDS: &[&str] = &[
    "id", "ids", "uuid", "guid", "name", "email", "message", "key", "type", "status", "code",
    "phone", "address", "url", "arn", "slug", "title", "label",
];

/// Name words that suggest a numeric attribute.
const NUMERIC_WORDS: &[&str] = &[
    "count", "total", "amount", "quantity", "qty", "price", "score", "ttl", "epoch", "version",
    "size", "age", "number", "seq",
];

/// Lower-cased words of a camelCase, snake_case or kebab-case name.
fn name_words(name: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut previous: Option<char> = None;
    for c in name.chars() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous = None;
            continue;
        }
        let boundary = c.is_ascii_uppercase()
            && previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit());
        if boundary && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.push(c.to_ascii_lowercase());
        previous = Some(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Type guessed from the attribute name alone, if any word gives it away.
fn guess_from_name(attribute: &str) -> Option<AttributeType> {
    let words = name_words(attribute);
    let has = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));
    if has(STRING_WORDS) {
        Some(AttributeType::String)
    } else if has(NUMERIC_WORDS) {
        Some(AttributeType::Number)
    } else {
        None
    }
}

pub struct DynamoAdapter {
    driver: Arc<dyn WideColumnDriver>,
    retry: RetryPolicy,
    cache: ExistenceCache,
}

impl DynamoAdapter {
    pub fn new(driver: Arc<dyn WideColumnDriver>) -> Self {
        Self {
            driver,
            retry: RetryPolicy::default(),
            cache: ExistenceCache::default(),
        }
    }

    /// Adapter using the configured retry policy and a fresh existence cache.
    pub fn from_config(driver: Arc<dyn WideColumnDriver>, config: &SchemaguardConfig) -> Self {
        Self::new(driver)
            .with_retry(config.retry_policy())
            .with_cache(config.existence_cache())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: ExistenceCache) -> Self {
        self.cache = cache;
        self
    }

    /// `Table` object of a `DescribeTable` response, `None` when absent.
    pub fn describe_table(&self, table: &str) -> Result<Option<Value>> {
        let ctx = ErrorContext::new(Engine::Dynamodb, "describe_table").table(table);
        let payload = json!({ "TableName": table });
        self.retry.run(&ctx, || {
            match self.driver.raw_request("DescribeTable", &payload) {
                Ok(Value::Object(mut response)) => Ok(Some(
                    response
                        .remove("Table")
                        .unwrap_or(Value::Object(response)),
                )),
                Ok(other) => Ok(Some(other)),
                Err(err) if err.has_code(RESOURCE_NOT_FOUND) => Ok(None),
                Err(err) => Err(err),
            }
        })
    }

    /// Type from the highest-priority source that declares `attribute`. A
    /// declared type that is not recognized is an error, never skipped.
    fn resolve_declared(
        spec: &WideColumnTableSpec,
        attribute: &str,
    ) -> Result<Option<AttributeType>> {
        let candidates = [
            (
                "AttributeDefinitions",
                spec.attribute_definitions
                    .iter()
                    .find(|d| d.attribute_name == attribute)
                    .map(|d| d.attribute_type.as_str()),
            ),
            ("attributes", spec.attributes.get(attribute).map(|a| a.type_name())),
            ("columns", spec.columns.get(attribute).map(|a| a.type_name())),
            (
                "AttributeTypes",
                spec.attribute_types.get(attribute).map(String::as_str),
            ),
        ];
        let Some((source, raw)) = candidates
            .into_iter()
            .find_map(|(source, raw)| raw.map(|raw| (source, raw)))
        else {
            return Ok(None);
        };
        AttributeType::from_name(raw).map(Some).ok_or_else(|| {
            MigrateError::configuration(format!(
                "dynamodb attribute {attribute}: {source} declares unknown type {raw:?}"
            ))
        })
    }

    fn key_schema(partition_key: &str, sort_key: Option<&str>) -> Value {
        let mut keys = vec![json!({ "AttributeName": partition_key, "KeyType": "HASH" })];
        if let Some(sk) = sort_key {
            keys.push(json!({ "AttributeName": sk, "KeyType": "RANGE" }));
        }
        Value::Array(keys)
    }

    fn throughput(throughput: &ProvisionedThroughput) -> Value {
        json!({
            "ReadCapacityUnits": throughput.read_capacity_units,
            "WriteCapacityUnits": throughput.write_capacity_units,
        })
    }

    fn attribute_definitions(&self, spec: &WideColumnTableSpec, names: &[&str]) -> Result<Value> {
        let definitions = names
            .iter()
            .map(|name| {
                Ok(json!({
                    "AttributeName": name,
                    "AttributeType": self.map_type(spec, name)?.code(),
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(definitions))
    }

    fn gsi_definition(
        &self,
        table: &str,
        spec: &WideColumnTableSpec,
        gsi: &GsiSpec,
    ) -> Result<Value> {
        let mut definition = Map::new();
        definition.insert("IndexName".into(), json!(gsi.index_name));
        definition.insert(
            "KeySchema".into(),
            Self::key_schema(&gsi.partition_key, gsi.sort_key.as_deref()),
        );
        let mut projection = Map::new();
        let projection_type = gsi
            .projection
            .as_ref()
            .map(|p| p.projection_type)
            .unwrap_or(ProjectionType::All);
        projection.insert("ProjectionType".into(), json!(projection_type.as_str()));
        if let Some(p) = &gsi.projection {
            if projection_type == ProjectionType::Include && !p.non_key_attributes.is_empty() {
                projection.insert("NonKeyAttributes".into(), json!(p.non_key_attributes));
            }
        }
        definition.insert("Projection".into(), Value::Object(projection));

        if spec.billing_mode == Some(BillingMode::Provisioned) {
            let throughput = gsi.provisioned_throughput.as_ref().ok_or_else(|| {
                MigrateError::configuration(format!(
                    "dynamodb {table}.{}: PROVISIONED tables require ProvisionedThroughput on every index",
                    gsi.index_name
                ))
            })?;
            definition.insert("ProvisionedThroughput".into(), Self::throughput(throughput));
        }
        Ok(Value::Object(definition))
    }
}

/// Push `name` unless already present, keeping first-appearance order.
fn push_unique<'a>(names: &mut Vec<&'a str>, name: &'a str) {
    if !names.contains(&name) {
        names.push(name);
    }
}

fn declared_attributes(description: &Value) -> Vec<String> {
    description
        .get("AttributeDefinitions")
        .and_then(Value::as_array)
        .map(|defs| {
            defs.iter()
                .filter_map(|d| d.get("AttributeName").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn has_gsi(description: &Value, index: &str) -> bool {
    description
        .get("GlobalSecondaryIndexes")
        .and_then(Value::as_array)
        .is_some_and(|indexes| {
            indexes
                .iter()
                .any(|g| g.get("IndexName").and_then(Value::as_str) == Some(index))
        })
}

impl SchemaAdapter for DynamoAdapter {
    fn engine(&self) -> Engine {
        Engine::Dynamodb
    }

    fn exists_table(&self, table: &str) -> Result<bool> {
        let key = CacheKey::table(table);
        if let Some(exists) = self.cache.get(&key) {
            return Ok(exists);
        }
        let exists = self.describe_table(table)?.is_some();
        log::debug!(target: "schemaguard", "dynamodb probe table {table}: exists={exists}");
        self.cache.insert(key, exists);
        Ok(exists)
    }

    fn exists_index(&self, table: &str, index: &str) -> Result<bool> {
        let key = CacheKey::child(ElementKind::SecondaryIndex, table, index);
        if let Some(exists) = self.cache.get(&key) {
            return Ok(exists);
        }
        let exists = self
            .describe_table(table)?
            .is_some_and(|description| has_gsi(&description, index));
        log::debug!(target: "schemaguard", "dynamodb probe index {table}.{index}: exists={exists}");
        self.cache.insert(key, exists);
        Ok(exists)
    }

    fn execute(&self, statement: &Statement) -> Result<()> {
        let Statement::Request {
            table,
            action,
            payload,
        } = statement
        else {
            return Err(MigrateError::configuration(format!(
                "dynamodb adapter cannot run SQL statement {statement}"
            )));
        };
        let ctx = ErrorContext::new(Engine::Dynamodb, "execute").table(table.as_str());
        let result = self
            .retry
            .run(&ctx, || self.driver.raw_request(action, payload));
        self.cache.invalidate_table(table);
        result.map(|_| ())
    }

    fn invalidate_cache(&self) {
        self.cache.clear();
    }
}

impl WideColumnAdapter for DynamoAdapter {
    fn map_type(&self, spec: &WideColumnTableSpec, attribute: &str) -> Result<AttributeType> {
        if let Some(resolved) = Self::resolve_declared(spec, attribute)? {
            return Ok(resolved);
        }
        if let Some(guessed) = guess_from_name(attribute) {
            return Ok(guessed);
        }
        log::warn!(
            target: "schemaguard",
            "dynamodb attribute {attribute}: no declared type, defaulting to S"
        );
        Ok(AttributeType::String)
    }

    fn build_create_table(
        &self,
        table: &str,
        spec: &WideColumnTableSpec,
        version: f64,
    ) -> Result<Statement> {
        let gsis = partition(spec.global_secondary_indexes.iter(), version)?.active;

        let mut names: Vec<&str> = Vec::new();
        for key in spec.key_attributes() {
            push_unique(&mut names, key);
        }
        for gsi in &gsis {
            for key in gsi.key_attributes() {
                push_unique(&mut names, key);
            }
        }

        let mut payload = Map::new();
        payload.insert("TableName".into(), json!(table));
        payload.insert(
            "AttributeDefinitions".into(),
            self.attribute_definitions(spec, &names)?,
        );
        payload.insert(
            "KeySchema".into(),
            Self::key_schema(&spec.partition_key, spec.sort_key.as_deref()),
        );
        let billing = spec.billing_mode.unwrap_or_default();
        payload.insert("BillingMode".into(), json!(billing.as_str()));
        if billing == BillingMode::Provisioned {
            let throughput = spec.provisioned_throughput.as_ref().ok_or_else(|| {
                MigrateError::configuration(format!(
                    "dynamodb {table}: BillingMode PROVISIONED requires ProvisionedThroughput"
                ))
            })?;
            payload.insert("ProvisionedThroughput".into(), Self::throughput(throughput));
        }
        if !gsis.is_empty() {
            let definitions = gsis
                .iter()
                .map(|gsi| self.gsi_definition(table, spec, gsi))
                .collect::<Result<Vec<_>>>()?;
            payload.insert("GlobalSecondaryIndexes".into(), Value::Array(definitions));
        }
        Ok(Statement::request(table, "CreateTable", Value::Object(payload)))
    }

    fn build_create_index(
        &self,
        table: &str,
        spec: &WideColumnTableSpec,
        gsi: &GsiSpec,
    ) -> Result<Statement> {
        let declared = self
            .describe_table(table)?
            .map(|description| declared_attributes(&description))
            .unwrap_or_default();

        let mut missing: Vec<&str> = Vec::new();
        for key in gsi.key_attributes() {
            if !declared.iter().any(|d| d == key) {
                push_unique(&mut missing, key);
            }
        }

        let mut payload = Map::new();
        payload.insert("TableName".into(), json!(table));
        if !missing.is_empty() {
            payload.insert(
                "AttributeDefinitions".into(),
                self.attribute_definitions(spec, &missing)?,
            );
        }
        payload.insert(
            "GlobalSecondaryIndexUpdates".into(),
            json!([{ "Create": self.gsi_definition(table, spec, gsi)? }]),
        );
        Ok(Statement::request(table, "UpdateTable", Value::Object(payload)))
    }
}
