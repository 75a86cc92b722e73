//! Migrator settings: retry policy, existence cache and table versions.
//!
//! Loaded from `config/schemaguard.toml` (optional) and `SCHEMAGUARD__*`
//! environment variables, e.g. `SCHEMAGUARD__RETRY__MAX_ATTEMPTS=5` or
//! `SCHEMAGUARD__VERSIONS__POSTGRES_USERS_VERSION=2.0`.

use crate::adapter::ExistenceCache;
use crate::retry::RetryPolicy;
use crate::version::{EnvVersions, FallbackVersions, StaticVersions};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "config/schemaguard.toml";
const ENV_PREFIX: &str = "SCHEMAGUARD";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaguardConfig {
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub cache: CacheSettings,
    /// Normalized version key (`POSTGRES_USERS_VERSION`) to table version.
    #[serde(default)]
    pub versions: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_jitter_factor() -> f64 {
    0.2
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_cache_ttl_seconds() -> u64 {
    60
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

impl SchemaguardConfig {
    /// Load from [`DEFAULT_CONFIG_FILE`], falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from `path` (optional) plus the environment. An unreadable or
    /// malformed file is logged and skipped.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment());

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                if path.exists() {
                    log::warn!(
                        target: "schemaguard",
                        "failed to load {}, falling back to env: {err}",
                        path.display()
                    );
                }
                Config::builder()
                    .add_source(environment())
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {err}, then env-only error: {env_err}"
                        ))
                    })?
            }
        };

        let config: SchemaguardConfig = settings.try_deserialize().map_err(|e| {
            ConfigError::Message(format!("schemaguard configuration is invalid: {e}"))
        })?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(ConfigError::Message("retry.max_attempts must be at least 1".into()));
        }
        if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
            return Err(ConfigError::Message("retry.backoff_factor must be >= 1.0".into()));
        }
        if !(0.0..1.0).contains(&retry.jitter_factor) {
            return Err(ConfigError::Message("retry.jitter_factor must be in [0, 1)".into()));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::Message("cache.capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let retry = &self.retry;
        RetryPolicy::new(
            retry.max_attempts,
            Duration::from_millis(retry.initial_delay_ms),
            retry.backoff_factor,
            Duration::from_millis(retry.max_delay_ms),
            retry.jitter_factor,
        )
    }

    /// A fresh cache for one adapter; caches are never shared.
    pub fn existence_cache(&self) -> ExistenceCache {
        ExistenceCache::new(self.cache.capacity, Duration::from_secs(self.cache.ttl_seconds))
    }

    pub fn static_versions(&self) -> StaticVersions {
        StaticVersions::from_map(self.versions.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Configured versions first, then the process environment.
    pub fn version_source(&self) -> FallbackVersions<StaticVersions, EnvVersions> {
        FallbackVersions::new(self.static_versions(), EnvVersions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::version::VersionSource;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SchemaguardConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.retry_policy().max_attempts, 3);
    }

    #[test]
    fn test_file_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemaguard.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[retry]\nmax_attempts = 5\ninitial_delay_ms = 10\n\n[cache]\nttl_seconds = 5\n\n[versions]\nPOSTGRES_USERS_VERSION = 2.5"
        )
        .unwrap();

        let config = SchemaguardConfig::load_from(&path).unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
        assert_eq!(config.cache.ttl_seconds, 5);
        assert_eq!(
            config
                .static_versions()
                .table_version(Engine::Postgres, "users")
                .unwrap(),
            Some(2.5)
        );
    }

    #[test]
    fn test_invalid_jitter_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemaguard.toml");
        std::fs::write(&path, "[retry]\njitter_factor = 1.5\n").unwrap();
        assert!(SchemaguardConfig::load_from(&path).is_err());
    }
}
