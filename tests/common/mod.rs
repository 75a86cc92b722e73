//! In-memory drivers and a recording observer shared by the integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use regex::Regex;
use schemaguard::driver::{DriverError, Row, SqlDriver, WideColumnDriver};
use schemaguard::observer::Observer;
use schemaguard::{Engine, RetryPolicy};
use sea_query::{Value, Values};
use serde_json::{json, Value as Json};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

fn no_sleep(_: Duration) {}

/// Default policy without real sleeps.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::default().with_sleeper(no_sleep)
}

#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub columns: BTreeSet<String>,
    pub indexes: BTreeSet<String>,
}

#[derive(Default)]
struct SqlState {
    tables: BTreeMap<String, FakeTable>,
    executed: Vec<String>,
    probes: usize,
    failures: VecDeque<DriverError>,
}

/// Relational driver that answers catalog probes from an in-memory table set
/// and applies the DDL it is given.
#[derive(Default)]
pub struct FakeSqlDriver {
    state: Mutex<SqlState>,
}

fn quoted(name: &str) -> String {
    format!(r#"["`]{name}["`]"#)
}

impl FakeSqlDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_table(
        self: Arc<Self>,
        table: &str,
        columns: &[&str],
        indexes: &[&str],
    ) -> Arc<Self> {
        self.state.lock().tables.insert(
            table.to_string(),
            FakeTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                indexes: indexes.iter().map(|i| i.to_string()).collect(),
            },
        );
        self
    }

    /// Queue errors returned by the next driver calls, oldest first.
    pub fn fail_next(&self, error: DriverError) {
        self.state.lock().failures.push_back(error);
    }

    /// Queued errors not yet handed out.
    pub fn pending_failures(&self) -> usize {
        self.state.lock().failures.len()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    pub fn probes(&self) -> usize {
        self.state.lock().probes
    }

    pub fn table(&self, name: &str) -> Option<FakeTable> {
        self.state.lock().tables.get(name).cloned()
    }

    /// Remove a table behind the migrator's back.
    pub fn drop_table(&self, name: &str) {
        self.state.lock().tables.remove(name);
    }

    fn apply_ddl(state: &mut SqlState, sql: &str) {
        let create_table = Regex::new(&format!(
            r"(?s)^CREATE TABLE (?:IF NOT EXISTS )?{}\s*\((.*)\)",
            quoted("([^\"`]+)")
        ))
        .unwrap();
        let column_def = Regex::new(r#"(?:\(|,)\s*["`]([^"`]+)["`]\s+\w"#).unwrap();
        let add_column = Regex::new(&format!(
            r"^ALTER TABLE {} ADD COLUMN (?:IF NOT EXISTS )?{}",
            quoted("([^\"`]+)"),
            quoted("([^\"`]+)")
        ))
        .unwrap();
        let create_index = Regex::new(&format!(
            r"^CREATE (?:UNIQUE )?INDEX (?:IF NOT EXISTS )?{} ON {}",
            quoted("([^\"`]+)"),
            quoted("([^\"`]+)")
        ))
        .unwrap();

        if let Some(caps) = create_table.captures(sql) {
            let body = format!("({}", &caps[2]);
            let table = state.tables.entry(caps[1].to_string()).or_default();
            for column in column_def.captures_iter(&body) {
                table.columns.insert(column[1].to_string());
            }
        } else if let Some(caps) = add_column.captures(sql) {
            if let Some(table) = state.tables.get_mut(&caps[1]) {
                table.columns.insert(caps[2].to_string());
            }
        } else if let Some(caps) = create_index.captures(sql) {
            if let Some(table) = state.tables.get_mut(&caps[2]) {
                table.indexes.insert(caps[1].to_string());
            }
        }
    }
}

fn strings(values: &Values) -> Vec<String> {
    values
        .0
        .iter()
        .filter_map(|value| match value {
            Value::String(Some(s)) => Some(s.to_string()),
            _ => None,
        })
        .collect()
}

impl SqlDriver for FakeSqlDriver {
    fn get_row(&self, sql: &str, values: &Values) -> Result<Option<Row>, DriverError> {
        let mut state = self.state.lock();
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state.probes += 1;

        let args = strings(values);
        let last = |n: usize| &args[args.len().saturating_sub(n)..];
        let found = if sql.contains("pg_indexes") || sql.contains("statistics") {
            match last(2) {
                [table, index] => state
                    .tables
                    .get(table)
                    .is_some_and(|t| t.indexes.contains(index)),
                _ => false,
            }
        } else if sql.contains("columns") {
            match last(2) {
                [table, column] => state
                    .tables
                    .get(table)
                    .is_some_and(|t| t.columns.contains(column)),
                _ => false,
            }
        } else if sql.contains("tables") {
            last(1)
                .first()
                .is_some_and(|table| state.tables.contains_key(table))
        } else {
            false
        };
        Ok(found.then(Row::new))
    }

    fn execute(&self, sql: &str, _values: &Values) -> Result<u64, DriverError> {
        let mut state = self.state.lock();
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state.executed.push(sql.to_string());
        Self::apply_ddl(&mut state, sql);
        Ok(0)
    }

    fn schema_name(&self) -> Result<String, DriverError> {
        Ok("public".to_string())
    }
}

#[derive(Default)]
struct WideState {
    tables: BTreeMap<String, Json>,
    requests: Vec<(String, Json)>,
}

/// Wide-column driver keeping table descriptions in memory.
#[derive(Default)]
pub struct FakeWideColumnDriver {
    state: Mutex<WideState>,
}

impl FakeWideColumnDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_table(self: Arc<Self>, name: &str, description: Json) -> Arc<Self> {
        self.state.lock().tables.insert(name.to_string(), description);
        self
    }

    /// Payloads of every request with the given action.
    pub fn requests(&self, action: &str) -> Vec<Json> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(a, _)| a == action)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// CreateTable and UpdateTable requests.
    pub fn mutations(&self) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(a, _)| a != "DescribeTable")
            .count()
    }
}

fn table_name(payload: &Json) -> Result<String, DriverError> {
    payload
        .get("TableName")
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| DriverError::with_code("ValidationException", "TableName is required"))
}

fn not_found() -> DriverError {
    DriverError::with_code("ResourceNotFoundException", "Requested resource not found")
}

fn array_mut<'a>(description: &'a mut Json, key: &str) -> &'a mut Vec<Json> {
    if !description.get(key).is_some_and(Json::is_array) {
        description[key] = json!([]);
    }
    description[key].as_array_mut().unwrap()
}

impl WideColumnDriver for FakeWideColumnDriver {
    fn raw_request(&self, action: &str, payload: &Json) -> Result<Json, DriverError> {
        let mut state = self.state.lock();
        state.requests.push((action.to_string(), payload.clone()));
        let name = table_name(payload)?;
        match action {
            "DescribeTable" => state
                .tables
                .get(&name)
                .map(|description| json!({ "Table": description }))
                .ok_or_else(not_found),
            "CreateTable" => {
                if state.tables.contains_key(&name) {
                    return Err(DriverError::with_code(
                        "ResourceInUseException",
                        "Table already exists",
                    ));
                }
                state.tables.insert(name, payload.clone());
                Ok(json!({}))
            }
            "UpdateTable" => {
                let description = state.tables.get_mut(&name).ok_or_else(not_found)?;
                if let Some(defs) = payload.get("AttributeDefinitions").and_then(Json::as_array) {
                    array_mut(description, "AttributeDefinitions").extend(defs.iter().cloned());
                }
                let creates: Vec<Json> = payload
                    .get("GlobalSecondaryIndexUpdates")
                    .and_then(Json::as_array)
                    .map(|updates| {
                        updates.iter().filter_map(|u| u.get("Create").cloned()).collect()
                    })
                    .unwrap_or_default();
                array_mut(description, "GlobalSecondaryIndexes").extend(creates);
                Ok(json!({}))
            }
            other => Err(DriverError::new(format!("unsupported action {other}"))),
        }
    }
}

/// Observer that keeps everything it is told.
#[derive(Default)]
pub struct RecordingObserver {
    pub logs: Mutex<Vec<(log::Level, String)>>,
    pub applied: Mutex<Vec<(Engine, usize, bool)>>,
    pub validations: Mutex<Vec<(bool, usize, usize)>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl Observer for RecordingObserver {
    fn log(&self, level: log::Level, message: &str, _context: &Json) {
        self.logs.lock().push((level, message.to_string()));
    }

    fn additions_applied(&self, engine: Engine, count: usize, dry_run: bool) {
        self.applied.lock().push((engine, count, dry_run));
    }

    fn validation_finished(&self, passed: bool, checks: usize, failures: usize) {
        self.validations.lock().push((passed, checks, failures));
    }
}

/// Attribute names in a request's `AttributeDefinitions`.
pub fn attribute_names(payload: &Json) -> BTreeSet<String> {
    payload
        .get("AttributeDefinitions")
        .and_then(Json::as_array)
        .map(|defs| {
            defs.iter()
                .filter_map(|d| d.get("AttributeName").and_then(Json::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
