//! Process environment inputs to settings resolution.
//!
//! The environment contributes exactly three kinds of input, captured once
//! at startup into an [`EnvOverlay`]:
//!
//! - **Locators**: `LYCEUM_CFG` (path to the configuration document) and
//!   `CONFIG_ROOT` (directory searched for documents when no explicit path
//!   is given).
//! - **Identity**: `SERVICE_VARIANT`, naming which service of the platform
//!   this process runs as (`lms`, `studio`, ...). The variant selects
//!   variant-specific document names and prefixes derived queue names.
//! - **Secrets**: the `DB_MIGRATION_*` allowlist, which overrides database
//!   credentials for migration runs without touching the document on disk.
//!
//! No other environment variable influences resolution. Arbitrary
//! `LYCEUM_*` lookups are deliberately not supported; every override has a
//! named field here.

use std::path::PathBuf;

use figment::Figment;
use figment::providers::Env;
use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, SettingsResult};

/// Environment variable holding the path of the configuration document.
pub const CONFIG_PATH_VAR: &str = "LYCEUM_CFG";

/// Environment variable naming the service variant.
pub const SERVICE_VARIANT_VAR: &str = "SERVICE_VARIANT";

/// Environment variable overriding the document search root.
pub const CONFIG_ROOT_VAR: &str = "CONFIG_ROOT";

/// Prefix of the database-migration credential allowlist.
pub const DB_MIGRATION_PREFIX: &str = "DB_MIGRATION_";

/// Which service of the platform this process is running as.
///
/// The variant is advisory identity, not behavior: it selects the
/// variant-specific document name (`lyceum.lms.yml`), prefixes derived
/// queue names, and tags log output. An unset variant is a valid
/// single-service deployment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServiceVariant {
    /// No variant configured (single-service deployment).
    #[default]
    None,
    /// A named variant such as `lms` or `studio`.
    Named(String),
}

impl ServiceVariant {
    /// Reads the variant from `SERVICE_VARIANT`.
    pub fn from_env() -> Self {
        match std::env::var(SERVICE_VARIANT_VAR) {
            Ok(name) if !name.is_empty() => Self::Named(name),
            _ => Self::None,
        }
    }

    /// Creates a named variant.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Returns the variant name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Named(name) => Some(name),
        }
    }

    /// Returns the key prefix contributed by this variant: `"{name}."`,
    /// or the empty string when no variant is set.
    pub fn config_prefix(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Named(name) => format!("{name}."),
        }
    }

    /// Returns the lowercased prefix used when assembling queue names.
    pub fn queue_segment(&self) -> String {
        self.config_prefix().to_lowercase()
    }
}

impl std::fmt::Display for ServiceVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name().unwrap_or("default"))
    }
}

/// Database credential overrides for migration runs.
///
/// Sourced from `DB_MIGRATION_*` environment variables, these take
/// precedence over the document for every configured database except the
/// read replica, which migrations never touch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MigrationOverrides {
    /// `DB_MIGRATION_ENGINE`
    pub engine: Option<String>,
    /// `DB_MIGRATION_USER`
    pub user: Option<String>,
    /// `DB_MIGRATION_PASS`
    pub pass: Option<String>,
    /// `DB_MIGRATION_NAME`
    pub name: Option<String>,
    /// `DB_MIGRATION_HOST`
    pub host: Option<String>,
    /// `DB_MIGRATION_PORT`
    pub port: Option<String>,
}

impl MigrationOverrides {
    /// Reads the `DB_MIGRATION_*` allowlist from the environment.
    pub fn from_env() -> SettingsResult<Self> {
        Figment::new()
            .merge(Env::prefixed(DB_MIGRATION_PREFIX))
            .extract()
            .map_err(SettingsError::parse)
    }

    /// Returns true when no override is present.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Parses the port override, if set.
    pub fn port_number(&self) -> SettingsResult<Option<u16>> {
        match &self.port {
            None => Ok(None),
            Some(raw) => raw.parse::<u16>().map(Some).map_err(|_| {
                SettingsError::validation(format!("DB_MIGRATION_PORT is not a port: {raw:?}"))
            }),
        }
    }
}

/// Snapshot of every environment input the resolver consults.
///
/// Capturing the environment once keeps [`crate::resolve::resolve`] a pure
/// function of its arguments: the same document and the same overlay always
/// produce the same settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvOverlay {
    /// Service variant from `SERVICE_VARIANT`.
    pub variant: ServiceVariant,
    /// Document path from `LYCEUM_CFG`, if set.
    pub document_path: Option<PathBuf>,
    /// Search root from `CONFIG_ROOT`, if set.
    pub config_root: Option<PathBuf>,
    /// Database migration credential overrides.
    pub migration: MigrationOverrides,
}

impl EnvOverlay {
    /// Captures the current process environment.
    pub fn from_env() -> SettingsResult<Self> {
        Ok(Self {
            variant: ServiceVariant::from_env(),
            document_path: std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from),
            config_root: std::env::var_os(CONFIG_ROOT_VAR).map(PathBuf::from),
            migration: MigrationOverrides::from_env()?,
        })
    }

    /// Creates an overlay for the given variant with nothing else set.
    pub fn for_variant(variant: ServiceVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    /// Returns the document path, failing if `LYCEUM_CFG` was not set.
    pub fn require_document_path(&self) -> SettingsResult<&PathBuf> {
        self.document_path
            .as_ref()
            .ok_or(SettingsError::MissingEnvVar(CONFIG_PATH_VAR))
    }
}

// =============================================================================
// Tests
// =============================================================================
