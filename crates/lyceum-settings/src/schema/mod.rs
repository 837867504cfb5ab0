//! The resolved settings schema.
//!
//! [`Settings`] is the immutable product of [`crate::resolve::resolve`]:
//! every value the platform reads at runtime lives in one of the typed
//! groups below. Unlike the document, nothing here is optional-by-absence;
//! each field either carries its built-in default or the operator's
//! resolved override.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_yaml::Value;

use crate::document::Document;
use crate::error::{SettingsError, SettingsResult};

mod auth;
mod database;
mod email;
mod services;
mod session;
mod site;
mod storage;
mod tracking;
mod worker;

pub use auth::{
    AuthSettings, CasSettings, LtiProviderSettings, OAuth2Settings, ThirdPartyAuthSettings,
};
pub use database::{CacheConfig, DatabaseConfig, DatabaseSettings};
pub use email::{BulkEmailSettings, EmailSettings};
pub use services::{
    AnalyticsSettings, CertificateSettings, CommentsSettings, CommerceSettings, CreditSettings,
    EnterpriseSettings, GradeExportConfig, GradingQueueInterface, HelpdeskSettings, NotesSettings,
    RetirementSettings, SandboxSettings, SearchSettings, ServiceSettings,
};
pub use session::{CorsSettings, SessionSettings};
pub use site::{SiteSettings, ThemingSettings};
pub use storage::StorageSettings;
pub(crate) use storage::{FILESYSTEM_STORAGE, OBJECT_STORE_STORAGE};
pub use tracking::TrackingSettings;
pub use worker::{BrokerSettings, QueueNames, RoutingKeys, ScheduledTask, WorkerSettings};

/// Fully resolved deployment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Settings {
    /// Name of the service variant this process runs as, if any.
    pub service_variant: Option<String>,
    /// Key prefix contributed by the variant (`"lms."` or empty).
    pub config_prefix: String,
    /// Directory the configuration document was resolved from.
    pub config_root: PathBuf,
    /// Always false: this resolver only produces production settings.
    pub debug: bool,

    pub site: SiteSettings,
    pub theming: ThemingSettings,
    pub session: SessionSettings,
    pub cors: CorsSettings,
    pub auth: AuthSettings,
    pub email: EmailSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub worker: WorkerSettings,
    pub tracking: TrackingSettings,
    pub services: ServiceSettings,
    pub features: FeatureFlags,
    pub registries: Registries,
    pub logging: LogSettings,
}

/// Platform feature flags.
///
/// Flags are an open map rather than a fixed struct: extensions and newer
/// platform code introduce flags without a schema change. The accessors
/// below cover the flags this crate itself branches on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureFlags(BTreeMap<String, Value>);

/// Flags known to the platform core and their shipped defaults.
const DEFAULT_FLAGS: &[(&str, bool)] = &[
    ("AUTH_USE_CAS", false),
    ("ENABLE_THIRD_PARTY_AUTH", false),
    ("ENABLE_OAUTH2_PROVIDER", false),
    ("ENABLE_CORS_HEADERS", false),
    ("ENABLE_CROSS_DOMAIN_CSRF_COOKIE", false),
    ("ENABLE_CUSTOM_COURSES", false),
    ("INDIVIDUAL_DUE_DATES", false),
    ("ENABLE_LTI_PROVIDER", false),
    ("ENABLE_EXTENDED_HISTORY", false),
    ("ENABLE_COURSEWARE_SEARCH", false),
    ("ENABLE_DASHBOARD_SEARCH", false),
    ("ENABLE_COURSE_DISCOVERY", false),
    ("ENABLE_DISCUSSION_SERVICE", true),
    ("ENABLE_BULK_EMAIL", true),
    ("ENABLE_GRADE_DOWNLOADS", true),
    ("ENABLE_MOBILE_REST_API", false),
    ("ENABLE_ENTERPRISE_INTEGRATION", false),
    ("ENABLE_VIDEO_UPLOAD_PIPELINE", false),
    ("LICENSING", false),
];

impl Default for FeatureFlags {
    fn default() -> Self {
        let mut flags = BTreeMap::new();
        for (name, on) in DEFAULT_FLAGS {
            flags.insert((*name).to_string(), Value::Bool(*on));
        }
        flags.insert("PREVIEW_LMS_BASE".to_string(), Value::String(String::new()));
        Self(flags)
    }
}

impl FeatureFlags {
    /// Returns true when the flag is present and `true`.
    pub fn enabled(&self, flag: &str) -> bool {
        matches!(self.0.get(flag), Some(Value::Bool(true)))
    }

    /// Returns the flag's string value, if it is a non-empty string.
    pub fn text(&self, flag: &str) -> Option<&str> {
        match self.0.get(flag) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// Returns the raw flag value.
    pub fn get(&self, flag: &str) -> Option<&Value> {
        self.0.get(flag)
    }

    /// Sets a flag.
    pub fn set(&mut self, flag: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(flag.into(), value.into());
    }

    /// Number of known flags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no flags are set at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all flags in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overrides flags from the document, one key at a time.
    ///
    /// Flags the document does not mention keep their defaults; flags it
    /// does mention are replaced wholesale, including non-boolean values.
    pub(crate) fn apply(&mut self, doc: &Document) {
        if let Some(overrides) = &doc.features {
            for (name, value) in overrides {
                self.0.insert(name.clone(), value.clone());
            }
        }
    }

    // Accessors for the flags the resolver itself branches on.

    pub fn auth_use_cas(&self) -> bool {
        self.enabled("AUTH_USE_CAS")
    }

    pub fn third_party_auth(&self) -> bool {
        self.enabled("ENABLE_THIRD_PARTY_AUTH")
    }

    pub fn oauth2_provider(&self) -> bool {
        self.enabled("ENABLE_OAUTH2_PROVIDER")
    }

    pub fn cors_headers(&self) -> bool {
        self.enabled("ENABLE_CORS_HEADERS")
    }

    pub fn cross_domain_csrf_cookie(&self) -> bool {
        self.enabled("ENABLE_CROSS_DOMAIN_CSRF_COOKIE")
    }

    pub fn custom_courses(&self) -> bool {
        self.enabled("ENABLE_CUSTOM_COURSES")
    }

    pub fn individual_due_dates(&self) -> bool {
        self.enabled("INDIVIDUAL_DUE_DATES")
    }

    pub fn lti_provider(&self) -> bool {
        self.enabled("ENABLE_LTI_PROVIDER")
    }

    pub fn extended_history(&self) -> bool {
        self.enabled("ENABLE_EXTENDED_HISTORY")
    }

    pub fn any_search(&self) -> bool {
        self.enabled("ENABLE_COURSEWARE_SEARCH")
            || self.enabled("ENABLE_DASHBOARD_SEARCH")
            || self.enabled("ENABLE_COURSE_DISCOVERY")
    }

    pub fn licensing(&self) -> bool {
        self.enabled("LICENSING")
    }

    pub fn preview_base(&self) -> Option<&str> {
        self.text("PREVIEW_LMS_BASE")
    }
}

/// Component registries handed to the host framework at startup.
///
/// Entries are opaque component paths; this crate only assembles the
/// lists, it never loads them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registries {
    /// Applications loaded by the platform.
    pub installed_apps: Vec<String>,
    /// Request middleware chain, in order.
    pub middleware: Vec<String>,
    /// Authentication backends, tried in order.
    pub auth_backends: Vec<String>,
    /// Course field override providers.
    pub field_override_providers: Vec<String>,
    /// Wrappers applied around course field data.
    pub field_data_wrappers: Vec<String>,
    /// Per-component configuration blobs, keyed by component name.
    pub component_settings: BTreeMap<String, Value>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            installed_apps: vec![
                "lyceum.apps.core".to_string(),
                "lyceum.apps.accounts".to_string(),
                "lyceum.apps.courseware".to_string(),
                "lyceum.apps.enrollment".to_string(),
                "lyceum.apps.discussion".to_string(),
                "lyceum.apps.assessment".to_string(),
                "lyceum.apps.certificates".to_string(),
                "lyceum.apps.dashboard".to_string(),
                "lyceum.apps.wiki".to_string(),
                "lyceum.apps.support".to_string(),
            ],
            middleware: vec![
                "lyceum.middleware.RequestId".to_string(),
                "lyceum.middleware.Session".to_string(),
                "lyceum.middleware.Locale".to_string(),
                "lyceum.middleware.Csrf".to_string(),
                "lyceum.middleware.Authentication".to_string(),
                "lyceum.middleware.FrameOptions".to_string(),
                "lyceum.middleware.Tracking".to_string(),
            ],
            auth_backends: vec!["lyceum.auth.backends.ModelBackend".to_string()],
            field_override_providers: Vec::new(),
            field_data_wrappers: Vec::new(),
            component_settings: BTreeMap::new(),
        }
    }
}

impl Registries {
    pub(crate) fn apply(&mut self, doc: &Document) {
        if let Some(apps) = &doc.addl_installed_apps {
            self.installed_apps.extend(apps.iter().cloned());
        }
        if let Some(middleware) = &doc.extra_middleware {
            self.middleware.extend(middleware.iter().cloned());
        }
        // Override lists replace wholesale; feature fan-out appends after.
        if let Some(providers) = &doc.field_override_providers {
            self.field_override_providers = providers.clone();
        }
        if let Some(wrappers) = &doc.field_data_wrappers {
            self.field_data_wrappers = wrappers.clone();
        }
        if let Some(components) = &doc.component_settings {
            self.component_settings = components.clone();
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSettings {
    /// Log level for platform loggers (trace, debug, info, warn, error).
    pub level: String,
    /// Directory for platform log files.
    pub dir: PathBuf,
    /// Deployment tag stamped on every record (`prod-east`, `stage`, ...).
    pub env_name: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: PathBuf::new(),
            env_name: String::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LogSettings {
    pub(crate) fn apply(&mut self, doc: &Document) -> SettingsResult<()> {
        if let Some(level) = &doc.local_loglevel {
            self.level = level.to_lowercase();
        }
        self.dir = doc
            .log_dir
            .clone()
            .ok_or(SettingsError::missing_key("LOG_DIR"))?;
        self.env_name = doc
            .logging_env
            .clone()
            .ok_or(SettingsError::missing_key("LOGGING_ENV"))?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let flags = FeatureFlags::default();
        assert!(!flags.auth_use_cas());
        assert!(!flags.third_party_auth());
        assert!(flags.enabled("ENABLE_DISCUSSION_SERVICE"));
        assert_eq!(flags.preview_base(), None);
    }

    #[test]
    fn test_flag_overrides_merge_per_key() {
        let doc = Document::from_yaml(
            r#"
            FEATURES:
              AUTH_USE_CAS: true
              PREVIEW_LMS_BASE: preview.lyceum.example.edu
            "#,
        )
        .unwrap();

        let mut flags = FeatureFlags::default();
        let before = flags.len();
        flags.apply(&doc);

        assert!(flags.auth_use_cas());
        assert_eq!(flags.preview_base(), Some("preview.lyceum.example.edu"));
        // Unmentioned flags keep their defaults.
        assert!(flags.enabled("ENABLE_BULK_EMAIL"));
        assert_eq!(flags.len(), before);
    }

    #[test]
    fn test_non_boolean_flag_is_not_enabled() {
        let mut flags = FeatureFlags::default();
        flags.set("ODD_FLAG", Value::String("yes".into()));
        assert!(!flags.enabled("ODD_FLAG"));
    }

    #[test]
    fn test_registry_extension_and_replacement() {
        let doc = Document::from_yaml(
            r#"
            ADDL_INSTALLED_APPS: ["acme.reporting"]
            EXTRA_MIDDLEWARE: ["acme.middleware.Audit"]
            FIELD_DATA_WRAPPERS: ["acme.wrappers.Replay"]
            "#,
        )
        .unwrap();

        let mut registries = Registries::default();
        let app_count = registries.installed_apps.len();
        registries.apply(&doc);

        assert_eq!(registries.installed_apps.len(), app_count + 1);
        assert_eq!(registries.installed_apps.last().unwrap(), "acme.reporting");
        assert_eq!(registries.middleware.last().unwrap(), "acme.middleware.Audit");
        // Wrapper list is a wholesale replacement.
        assert_eq!(registries.field_data_wrappers, ["acme.wrappers.Replay"]);
    }

    #[test]
    fn test_log_settings_require_dir_and_env() {
        let doc = Document::from_yaml("LOCAL_LOGLEVEL: DEBUG").unwrap();
        let err = LogSettings::default().apply(&doc).unwrap_err();
        assert!(matches!(err, SettingsError::MissingKey { key: "LOG_DIR" }));

        let doc = Document::from_yaml(
            r#"
            LOCAL_LOGLEVEL: DEBUG
            LOG_DIR: /var/log/lyceum
            LOGGING_ENV: prod-east
            "#,
        )
        .unwrap();
        let mut log = LogSettings::default();
        log.apply(&doc).unwrap();
        assert_eq!(log.level, "debug");
        assert_eq!(log.env_name, "prod-east");
    }
}
