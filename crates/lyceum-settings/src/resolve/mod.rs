//! The resolution pipeline.
//!
//! [`resolve`] turns a configuration document plus a captured environment
//! overlay into fully resolved [`Settings`]. The pipeline is a fixed
//! sequence of passes:
//!
//! 1. enumerated defaults ([`Settings::default`])
//! 2. per-group document overrides and merges
//! 3. feature fan-out over the final flag set
//! 4. registered extension hooks
//! 5. the derivation pass for computed values
//! 6. validation
//!
//! Nothing here touches the process environment; everything the resolver
//! consults arrives through its arguments. Resolving the same document and
//! overlay twice yields equal settings.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::document::Document;
use crate::env::EnvOverlay;
use crate::error::SettingsResult;
use crate::registry::SettingsRegistry;
use crate::schema::Settings;
use crate::validation;

mod derived;
mod fanout;
pub(crate) mod merge;

/// Where documents are searched when neither the environment nor the
/// document path pins a location.
const DEFAULT_CONFIG_ROOT: &str = "/etc/lyceum";

/// Resolves settings without any registered extensions.
pub fn resolve(document: &Document, env: &EnvOverlay) -> SettingsResult<Settings> {
    Resolver::new().resolve(document, env)
}

/// A configured resolution run.
///
/// The plain [`resolve`] function covers deployments without add-ons; a
/// `Resolver` additionally carries the [`SettingsRegistry`] whose attribute
/// resolvers and extension hooks participate in the run.
#[derive(Default)]
pub struct Resolver<'a> {
    registry: Option<&'a SettingsRegistry>,
}

impl<'a> Resolver<'a> {
    pub fn new() -> Self {
        Self { registry: None }
    }

    pub fn with_registry(registry: &'a SettingsRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    pub fn resolve(&self, doc: &Document, env: &EnvOverlay) -> SettingsResult<Settings> {
        debug!(variant = %env.variant, "resolving deployment settings");

        let mut settings = Settings::default();
        settings.service_variant = env.variant.name().map(str::to_string);
        settings.config_prefix = env.variant.config_prefix();
        settings.config_root = env
            .config_root
            .clone()
            .or_else(|| {
                env.document_path
                    .as_ref()
                    .and_then(|path| path.parent().map(Path::to_path_buf))
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_ROOT));

        settings.site.apply(doc)?;
        settings.theming.apply(doc);
        settings.session.apply(doc);
        settings.auth.apply(doc)?;
        settings.email.apply(doc);
        settings.database.apply(doc, &env.migration)?;
        settings.storage.apply(doc);
        settings.worker.apply(doc);
        settings.tracking.apply(doc);
        settings.services.apply(doc)?;
        settings.features.apply(doc);
        settings.registries.apply(doc);
        settings.logging.apply(doc)?;

        fanout::apply(&mut settings, doc, self.registry)?;
        if let Some(registry) = self.registry {
            registry.run_extensions(&mut settings, doc)?;
        }
        derived::finalize(&mut settings, doc);
        validation::validate(&settings)?;

        debug!(
            queues = settings.worker.queues.len(),
            features = settings.features.len(),
            "deployment settings resolved"
        );
        Ok(settings)
    }
}

// ====== Tests ======

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{MigrationOverrides, ServiceVariant};
    use crate::error::SettingsError;

    const MINIMAL_DOCUMENT: &str = r#"
SITE_NAME: lyceum.example.edu
SECRET_KEY: test-secret
LOG_DIR: /var/log/lyceum
LOGGING_ENV: test
DATABASES:
  default:
    NAME: lyceum
CACHES:
  default:
    BACKEND: lyceum.cache.backends.locmem.LocMemCache
GRADING_QUEUE_INTERFACE:
  URL: http://grader.internal
  AUTH_USER: grader
  AUTH_PASSWORD: graderpass
"#;

    fn minimal_document() -> Document {
        Document::from_yaml(MINIMAL_DOCUMENT).unwrap()
    }

    #[test]
    fn test_minimal_document_resolves() {
        let settings = resolve(&minimal_document(), &EnvOverlay::default()).unwrap();

        assert_eq!(settings.site.site_name, "lyceum.example.edu");
        assert_eq!(settings.site.platform_name, "Lyceum");
        assert_eq!(settings.auth.secret_key, "test-secret");
        assert!(!settings.debug);
        assert_eq!(settings.service_variant, None);
        assert_eq!(settings.config_prefix, "");
        assert_eq!(settings.config_root, PathBuf::from("/etc/lyceum"));
        assert_eq!(settings.worker.default_queue, "lyceum.core.default");
        assert_eq!(settings.worker.broker_url, "://:@/");
        assert!(settings.features.enabled("ENABLE_BULK_EMAIL"));
        assert!(!settings.features.enabled("AUTH_USE_CAS"));
        assert_eq!(settings.logging.dir, PathBuf::from("/var/log/lyceum"));
        // The local-memory cache for block locations is always present.
        assert!(settings.database.caches.contains_key("loc_cache"));
    }

    #[test]
    fn test_variant_threads_through_names() {
        let env = EnvOverlay::for_variant(ServiceVariant::named("lms"));
        let settings = resolve(&minimal_document(), &env).unwrap();

        assert_eq!(settings.service_variant.as_deref(), Some("lms"));
        assert_eq!(settings.config_prefix, "lms.");
        assert_eq!(settings.worker.default_priority_queue, "lyceum.lms.core.default");
        assert_eq!(settings.worker.default_exchange, "lyceum.lms.core");
    }

    #[test]
    fn test_missing_required_key_fails() {
        let mut doc = minimal_document();
        doc.secret_key = None;

        let err = resolve(&doc, &EnvOverlay::default()).unwrap_err();
        match err {
            SettingsError::MissingKey { key } => assert_eq!(key, "SECRET_KEY"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_resolution_is_pure() {
        let doc = minimal_document();
        let env = EnvOverlay::for_variant(ServiceVariant::named("lms"));

        let first = resolve(&doc, &env).unwrap();
        let second = resolve(&doc, &env).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_migration_overrides_take_precedence() {
        let mut doc = minimal_document();
        let extra = Document::from_yaml(
            r#"
DATABASES:
  default:
    NAME: lyceum
    HOST: db.internal
  read_replica:
    NAME: lyceum
    HOST: replica.internal
"#,
        )
        .unwrap();
        doc.databases = extra.databases;

        let env = EnvOverlay {
            migration: MigrationOverrides {
                host: Some("migration.internal".to_string()),
                ..MigrationOverrides::default()
            },
            ..EnvOverlay::default()
        };
        let settings = resolve(&doc, &env).unwrap();

        assert_eq!(settings.database.databases["default"].host, "migration.internal");
        // Migrations never run against the replica.
        assert_eq!(settings.database.databases["read_replica"].host, "replica.internal");
    }

    #[test]
    fn test_document_flags_drive_fanout() {
        let mut doc = minimal_document();
        let extra = Document::from_yaml("FEATURES:\n  ENABLE_THIRD_PARTY_AUTH: true").unwrap();
        doc.features = extra.features;

        let settings = resolve(&doc, &EnvOverlay::default()).unwrap();

        assert!(settings.features.third_party_auth());
        assert!(settings
            .worker
            .beat_schedule
            .contains_key("refresh-saml-metadata"));
        assert!(settings.registries.auth_backends.len() > 1);
    }

    #[test]
    fn test_config_root_prefers_env_then_document_parent() {
        let env = EnvOverlay {
            document_path: Some(PathBuf::from("/opt/lyceum/config/lyceum.yml")),
            ..EnvOverlay::default()
        };
        let settings = resolve(&minimal_document(), &env).unwrap();
        assert_eq!(settings.config_root, PathBuf::from("/opt/lyceum/config"));

        let env = EnvOverlay {
            config_root: Some(PathBuf::from("/srv/config")),
            document_path: Some(PathBuf::from("/opt/lyceum/config/lyceum.yml")),
            ..EnvOverlay::default()
        };
        let settings = resolve(&minimal_document(), &env).unwrap();
        assert_eq!(settings.config_root, PathBuf::from("/srv/config"));
    }

    #[test]
    fn test_registry_extension_runs_before_validation() {
        struct LevelExtension;

        impl crate::registry::SettingsExtension for LevelExtension {
            fn name(&self) -> &str {
                "level"
            }

            fn apply(
                &self,
                settings: &mut Settings,
                _document: &Document,
            ) -> SettingsResult<()> {
                settings.logging.level = "nonsense".to_string();
                Ok(())
            }
        }

        let mut registry = SettingsRegistry::new();
        registry.register(LevelExtension);

        let err = Resolver::with_registry(&registry)
            .resolve(&minimal_document(), &EnvOverlay::default())
            .unwrap_err();
        match err {
            SettingsError::ValidationError { .. } => {}
            other => panic!("unexpected error: {other}"),
        }
    }
}
