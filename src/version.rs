//! Per-table version numbers against which lifecycle markers are evaluated.
//!
//! Versions are looked up by a normalized key:
//! `<ENGINE>_<TABLE>_VERSION`, with runs of non-alphanumeric characters
//! collapsed to `_` and everything upper-cased. `postgres` + `user-profiles`
//! becomes `POSTGRES_USER_PROFILES_VERSION`. A missing version means `1.0`.

use crate::engine::Engine;
use crate::error::{MigrateError, Result};
use crate::ident::normalize_key;
use std::collections::HashMap;

/// Version used when the source has nothing for a table.
pub const DEFAULT_TABLE_VERSION: f64 = 1.0;

/// Build the lookup key for `(engine, table)`.
pub fn version_key(engine: Engine, table: &str) -> String {
    format!("{}_{}_VERSION", engine.version_prefix(), normalize_key(table))
}

/// Supplies the current version of each table. Read on every call, never
/// cached by the migrator.
pub trait VersionSource {
    /// `Ok(None)` when no version is configured for the table.
    fn table_version(&self, engine: Engine, table: &str) -> Result<Option<f64>>;
}

/// Resolve a table version, falling back to [`DEFAULT_TABLE_VERSION`].
pub fn resolve_version(source: &dyn VersionSource, engine: Engine, table: &str) -> Result<f64> {
    let version = source
        .table_version(engine, table)?
        .unwrap_or(DEFAULT_TABLE_VERSION);
    if !version.is_finite() || version < 0.0 {
        return Err(MigrateError::configuration(format!(
            "{}: table version must be a finite, non-negative number, got {version}",
            version_key(engine, table)
        )));
    }
    Ok(version)
}

fn parse_version(key: &str, raw: &str) -> Result<f64> {
    raw.trim().parse::<f64>().map_err(|_| {
        MigrateError::configuration(format!("{key}: table version {raw:?} is not a number"))
    })
}

/// Fixed versions keyed by normalized key; keys are matched case-insensitively
/// so maps coming out of `config` (which lower-cases keys) work unchanged.
#[derive(Debug, Clone, Default)]
pub struct StaticVersions {
    versions: HashMap<String, f64>,
}

impl StaticVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let versions = entries
            .into_iter()
            .map(|(k, v)| (normalize_key(k.as_ref()), v))
            .collect();
        Self { versions }
    }

    /// Set the version of one table.
    pub fn with(mut self, engine: Engine, table: &str, version: f64) -> Self {
        self.versions.insert(version_key(engine, table), version);
        self
    }
}

impl VersionSource for StaticVersions {
    fn table_version(&self, engine: Engine, table: &str) -> Result<Option<f64>> {
        Ok(self.versions.get(&version_key(engine, table)).copied())
    }
}

/// Versions read from the process environment (`POSTGRES_USERS_VERSION=2.1`).
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvVersions;

impl VersionSource for EnvVersions {
    fn table_version(&self, engine: Engine, table: &str) -> Result<Option<f64>> {
        let key = version_key(engine, table);
        match std::env::var(&key) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => parse_version(&key, &raw).map(Some),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(MigrateError::configuration(format!(
                "{key}: table version is not valid unicode"
            ))),
        }
    }
}

/// Consult `primary` first, then `secondary` for tables it has no entry for.
#[derive(Debug, Clone, Default)]
pub struct FallbackVersions<P, S> {
    pub primary: P,
    pub secondary: S,
}

impl<P, S> FallbackVersions<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P: VersionSource, S: VersionSource> VersionSource for FallbackVersions<P, S> {
    fn table_version(&self, engine: Engine, table: &str) -> Result<Option<f64>> {
        match self.primary.table_version(engine, table)? {
            Some(version) => Ok(Some(version)),
            None => self.secondary.table_version(engine, table),
        }
    }
}
