//! Storage engines a schema document can target.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three engines the migrator knows how to evolve.
///
/// The declaration order is also the order in which engines are planned,
/// applied and validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// PostgreSQL (identifiers quoted with `"`).
    Postgres,
    /// MySQL / MariaDB (identifiers quoted with `` ` ``).
    Mysql,
    /// DynamoDB-style wide-column store with global secondary indexes.
    Dynamodb,
}

impl Engine {
    /// All engines in planning order.
    pub const ALL: [Engine; 3] = [Engine::Postgres, Engine::Mysql, Engine::Dynamodb];

    /// Lower-case name used in documents, logs and plan metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Postgres => "postgres",
            Engine::Mysql => "mysql",
            Engine::Dynamodb => "dynamodb",
        }
    }

    /// Prefix used when building version-source keys.
    pub fn version_prefix(&self) -> &'static str {
        match self {
            Engine::Postgres => "POSTGRES",
            Engine::Mysql => "MYSQL",
            Engine::Dynamodb => "DYNAMODB",
        }
    }

    /// Whether the engine models tables with typed columns.
    pub fn is_relational(&self) -> bool {
        !matches!(self, Engine::Dynamodb)
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Engine::Postgres),
            "mysql" | "mariadb" => Ok(Engine::Mysql),
            "dynamodb" | "dynamo" => Ok(Engine::Dynamodb),
            other => Err(format!("unknown engine '{other}'")),
        }
    }
}
