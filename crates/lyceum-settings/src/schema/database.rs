//! Database and cache settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::document::Document;
use crate::env::MigrationOverrides;
use crate::error::{SettingsError, SettingsResult};

/// Database alias that migration credential overrides never touch.
const READ_REPLICA_ALIAS: &str = "read_replica";

/// Cache alias the course-location cache requires.
const LOC_CACHE_ALIAS: &str = "loc_cache";

/// One relational database connection.
///
/// Keys inside a `DATABASES` entry use the same SCREAMING_SNAKE_CASE
/// convention as the document's top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DatabaseConfig {
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Database name. Every entry must name its database.
    pub name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    /// Driver options passed through untyped.
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

fn default_engine() -> String {
    "lyceum.db.backends.mysql".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

/// One cache backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CacheConfig {
    /// Cache backend component path.
    pub backend: String,
    /// Backend location: a single address or a list of them.
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub key_prefix: Option<String>,
    #[serde(default)]
    pub key_function: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
}

impl CacheConfig {
    /// An in-process memory cache, used when an alias must exist but the
    /// document did not configure one.
    fn local_memory(location: &str) -> Self {
        Self {
            backend: "lyceum.cache.backends.locmem.LocMemCache".to_string(),
            location: Some(Value::from(location)),
            key_prefix: None,
            key_function: None,
            timeout: None,
            options: BTreeMap::new(),
        }
    }
}

/// Resolved database and cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct DatabaseSettings {
    /// Database connections by alias. `default` is the primary.
    pub databases: BTreeMap<String, DatabaseConfig>,
    /// Cache backends by alias.
    pub caches: BTreeMap<String, CacheConfig>,
}

impl DatabaseSettings {
    pub(crate) fn apply(
        &mut self,
        doc: &Document,
        migration: &MigrationOverrides,
    ) -> SettingsResult<()> {
        self.databases = doc
            .databases
            .clone()
            .ok_or(SettingsError::missing_key("DATABASES"))?;
        self.caches = doc
            .caches
            .clone()
            .ok_or(SettingsError::missing_key("CACHES"))?;

        self.apply_migration_overrides(migration)?;

        // The course-location cache must exist even when the operator
        // configured no backing store for it.
        self.caches
            .entry(LOC_CACHE_ALIAS.to_string())
            .or_insert_with(|| CacheConfig::local_memory("lyceum_location_mem_cache"));

        Ok(())
    }

    /// Overrides connection credentials from the environment for migration
    /// runs. The read replica is skipped: migrations never write to it.
    fn apply_migration_overrides(&mut self, migration: &MigrationOverrides) -> SettingsResult<()> {
        if migration.is_empty() {
            return Ok(());
        }
        let port = migration.port_number()?;
        for (alias, database) in &mut self.databases {
            if alias == READ_REPLICA_ALIAS {
                continue;
            }
            if let Some(engine) = &migration.engine {
                database.engine = engine.clone();
            }
            if let Some(user) = &migration.user {
                database.user = user.clone();
            }
            if let Some(pass) = &migration.pass {
                database.password = pass.clone();
            }
            if let Some(name) = &migration.name {
                database.name = name.clone();
            }
            if let Some(host) = &migration.host {
                database.host = host.clone();
            }
            if let Some(port) = port {
                database.port = Some(port);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
