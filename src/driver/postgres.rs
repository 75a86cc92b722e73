//! [`SqlDriver`] over a `may_postgres` client.
//!
//! Statements arrive as SQL text plus SeaQuery [`Values`]; values are
//! converted to `ToSql` parameters in two passes (collect into typed
//! vectors, then borrow) so the references live for the whole call.

use super::{DriverError, Row, SqlDriver};
use may_postgres::types::{ToSql, Type};
use may_postgres::Client;
use sea_query::{Value, Values};
use serde_json::Value as Json;

/// PostgreSQL driver backed by a connected `may_postgres::Client`.
pub struct PostgresDriver {
    client: Client,
}

impl PostgresDriver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with a libpq-style connection string.
    pub fn connect(url: &str) -> Result<Self, DriverError> {
        let client = may_postgres::connect(url).map_err(convert_error)?;
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn convert_error(err: may_postgres::Error) -> DriverError {
    DriverError {
        code: err.code().map(|state| state.code().to_string()),
        message: err.to_string(),
        trace: None,
    }
}

fn with_params<R>(
    values: &Values,
    f: impl FnOnce(&[&dyn ToSql]) -> Result<R, DriverError>,
) -> Result<R, DriverError> {
    let mut bools: Vec<bool> = Vec::new();
    let mut big_ints: Vec<i64> = Vec::new();
    let mut doubles: Vec<f64> = Vec::new();
    let mut strings: Vec<String> = Vec::new();
    let mut nulls: Vec<Option<String>> = Vec::new();

    for value in values.iter() {
        match value {
            Value::Bool(Some(b)) => bools.push(*b),
            Value::TinyInt(Some(i)) => big_ints.push(i64::from(*i)),
            Value::SmallInt(Some(i)) => big_ints.push(i64::from(*i)),
            Value::Int(Some(i)) => big_ints.push(i64::from(*i)),
            Value::BigInt(Some(i)) => big_ints.push(*i),
            Value::Unsigned(Some(u)) => big_ints.push(i64::from(*u)),
            Value::Double(Some(d)) => doubles.push(*d),
            Value::String(Some(s)) => strings.push(s.to_string()),
            Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::Unsigned(None)
            | Value::Double(None)
            | Value::String(None) => nulls.push(None),
            other => {
                return Err(DriverError::new(format!(
                    "unsupported parameter type in statement: {other:?}"
                )))
            }
        }
    }

    let (mut b, mut i, mut d, mut s, mut n) = (0, 0, 0, 0, 0);
    let mut params: Vec<&dyn ToSql> = Vec::with_capacity(values.iter().count());
    for value in values.iter() {
        match value {
            Value::Bool(Some(_)) => {
                params.push(&bools[b]);
                b += 1;
            }
            Value::TinyInt(Some(_))
            | Value::SmallInt(Some(_))
            | Value::Int(Some(_))
            | Value::BigInt(Some(_))
            | Value::Unsigned(Some(_)) => {
                params.push(&big_ints[i]);
                i += 1;
            }
            Value::Double(Some(_)) => {
                params.push(&doubles[d]);
                d += 1;
            }
            Value::String(Some(_)) => {
                params.push(&strings[s]);
                s += 1;
            }
            _ => {
                params.push(&nulls[n]);
                n += 1;
            }
        }
    }

    f(&params)
}

fn cell(row: &may_postgres::Row, idx: usize) -> Json {
    let ty = row.columns()[idx].type_();
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).ok().flatten().map(Json::from)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx).ok().flatten().map(Json::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx).ok().flatten().map(Json::from)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).ok().flatten().map(Json::from)
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).ok().flatten().map(Json::from)
    } else {
        row.try_get::<_, Option<String>>(idx).ok().flatten().map(Json::from)
    };
    value.unwrap_or(Json::Null)
}

fn to_row(row: &may_postgres::Row) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.name().to_string(), cell(row, idx)))
        .collect()
}

impl SqlDriver for PostgresDriver {
    fn get_row(&self, sql: &str, values: &Values) -> Result<Option<Row>, DriverError> {
        with_params(values, |params| {
            let rows = self.client.query(sql, params).map_err(convert_error)?;
            Ok(rows.first().map(to_row))
        })
    }

    fn execute(&self, sql: &str, values: &Values) -> Result<u64, DriverError> {
        with_params(values, |params| {
            self.client.execute(sql, params).map_err(convert_error)
        })
    }

    fn schema_name(&self) -> Result<String, DriverError> {
        let row = self
            .client
            .query_one("SELECT current_schema()", &[])
            .map_err(convert_error)?;
        row.try_get::<_, String>(0).map_err(convert_error)
    }
}
