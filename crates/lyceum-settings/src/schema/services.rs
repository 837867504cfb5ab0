//! Settings for companion services the platform talks to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::document::Document;
use crate::error::{SettingsError, SettingsResult};
use crate::resolve::merge::{deep_merge, overlay, overlay_opt};

/// Discussion forum service.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CommentsSettings {
    pub service_url: String,
    pub service_key: String,
}

/// External grading queue endpoint and credentials.
///
/// Unlike most groups this has no defaults: the document must configure
/// the whole interface or resolution fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct GradingQueueInterface {
    pub url: String,
    pub auth_user: String,
    pub auth_password: String,
    /// Optional HTTP basic-auth pair guarding the queue endpoint.
    #[serde(default)]
    pub basic_auth: Option<(String, String)>,
}

/// Certificate generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateSettings {
    pub queue: String,
    pub name_short: String,
    pub name_long: String,
}

impl Default for CertificateSettings {
    fn default() -> Self {
        Self {
            queue: "certificates".to_string(),
            name_short: "Certificate".to_string(),
            name_long: "Certificate of Achievement".to_string(),
        }
    }
}

/// Operator help desk.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct HelpdeskSettings {
    pub url: String,
    pub user: String,
    pub api_key: String,
    /// Ticket fields injected on every submission.
    pub custom_fields: BTreeMap<String, Value>,
}

/// Learner analytics API.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AnalyticsSettings {
    pub api_url: String,
    pub api_key: String,
}

/// Commerce service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommerceSettings {
    pub public_url_root: String,
    pub api_url: String,
    pub api_timeout_secs: u64,
    pub service_worker_username: String,
}

impl Default for CommerceSettings {
    fn default() -> Self {
        Self {
            public_url_root: String::new(),
            api_url: String::new(),
            api_timeout_secs: 5,
            service_worker_username: "commerce_worker".to_string(),
        }
    }
}

/// Credit-bearing course providers.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CreditSettings {
    pub help_link_url: String,
    /// Signing secrets by provider id.
    pub provider_secret_keys: BTreeMap<String, Value>,
}

/// Learner notes service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotesSettings {
    pub public_api: String,
    pub internal_api: String,
    pub connect_timeout_secs: f64,
    pub read_timeout_secs: f64,
}

impl Default for NotesSettings {
    fn default() -> Self {
        Self {
            public_api: "http://localhost:18120/api/v1".to_string(),
            internal_api: "http://localhost:18120/api/v1".to_string(),
            connect_timeout_secs: 0.5,
            read_timeout_secs: 1.5,
        }
    }
}

/// Enterprise integration endpoints.
///
/// The URL fields derive from the platform root URLs when the document
/// does not pin them; see the derivation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnterpriseSettings {
    pub api_url: Option<String>,
    pub consent_api_url: Option<String>,
    pub enrollment_api_url: Option<String>,
    pub public_enrollment_api_url: Option<String>,
    pub support_url: String,
    pub reporting_secret: Option<String>,
    pub service_worker_username: String,
    pub api_cache_timeout_secs: u64,
}

impl Default for EnterpriseSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            consent_api_url: None,
            enrollment_api_url: None,
            public_enrollment_api_url: None,
            support_url: String::new(),
            reporting_secret: None,
            service_worker_username: "enterprise_worker".to_string(),
            api_cache_timeout_secs: 3600,
        }
    }
}

/// Account retirement pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetirementSettings {
    pub username_prefix: String,
    pub email_prefix: String,
    pub email_domain: String,
    pub service_worker_username: String,
    /// Hash salts for retired identifiers. Operators rotate by appending.
    pub user_salts: Vec<String>,
    /// Workflow states, in order.
    pub states: Vec<String>,
}

impl Default for RetirementSettings {
    fn default() -> Self {
        Self {
            username_prefix: "retired_user".to_string(),
            email_prefix: "retired_email_".to_string(),
            email_domain: "retired.invalid".to_string(),
            service_worker_username: "retirement_worker".to_string(),
            user_salts: Vec::new(),
            states: Vec::new(),
        }
    }
}

/// Courseware search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSettings {
    /// Search engine component path. Set by fan-out when a search feature
    /// is on; absent means search is disabled.
    pub engine: Option<String>,
    /// Search cluster hosts, in the engine's own config format.
    pub elastic_config: Vec<Value>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            engine: None,
            elastic_config: vec![Value::Mapping(serde_yaml::Mapping::new())],
        }
    }
}

/// Untrusted course-code sandbox.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SandboxSettings {
    /// Sandbox options. Document entries merge two levels deep: nested
    /// maps merge per sub-key, scalars replace.
    pub options: BTreeMap<String, Value>,
    /// Courses allowed to bypass the sandbox entirely.
    pub unsafe_course_ids: Vec<String>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            options: default_sandbox_options(),
            unsafe_course_ids: Vec::new(),
        }
    }
}

fn default_sandbox_options() -> BTreeMap<String, Value> {
    let mut limits = serde_yaml::Mapping::new();
    limits.insert(Value::from("CPU"), Value::from(1));
    limits.insert(Value::from("REALTIME"), Value::from(3));
    limits.insert(Value::from("MEMORY"), Value::from(536_870_912));
    let mut options = BTreeMap::new();
    options.insert("limits".to_string(), Value::Mapping(limits));
    options
}

/// Grade export storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct GradeExportConfig {
    #[serde(default = "default_grade_storage_type")]
    pub storage_type: String,
    #[serde(default = "default_grade_bucket")]
    pub bucket: String,
    #[serde(default = "default_grade_root_path")]
    pub root_path: String,
}

impl Default for GradeExportConfig {
    fn default() -> Self {
        Self {
            storage_type: default_grade_storage_type(),
            bucket: default_grade_bucket(),
            root_path: default_grade_root_path(),
        }
    }
}

fn default_grade_storage_type() -> String {
    "localfs".to_string()
}

fn default_grade_bucket() -> String {
    "lyceum-grades".to_string()
}

fn default_grade_root_path() -> String {
    "/var/lyceum/grades".to_string()
}

/// All companion-service settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSettings {
    pub comments: CommentsSettings,
    pub grading_queue: GradingQueueInterface,
    pub certificates: CertificateSettings,
    pub helpdesk: HelpdeskSettings,
    pub analytics: AnalyticsSettings,
    pub commerce: CommerceSettings,
    pub catalog_api_url: Option<String>,
    pub credit: CreditSettings,
    pub notes: NotesSettings,
    /// Video CDN hosts by country code.
    pub video_cdn_urls: BTreeMap<String, String>,
    pub youtube_api_key: Option<String>,
    pub api_access_manager_email: Option<String>,
    pub api_access_from_email: Option<String>,
    pub enterprise: EnterpriseSettings,
    pub retirement: RetirementSettings,
    pub custom_courses_max_students: u32,
    pub search: SearchSettings,
    pub sandbox: SandboxSettings,
    pub grade_export: GradeExportConfig,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            comments: CommentsSettings::default(),
            grading_queue: GradingQueueInterface {
                url: String::new(),
                auth_user: String::new(),
                auth_password: String::new(),
                basic_auth: None,
            },
            certificates: CertificateSettings::default(),
            helpdesk: HelpdeskSettings::default(),
            analytics: AnalyticsSettings::default(),
            commerce: CommerceSettings::default(),
            catalog_api_url: None,
            credit: CreditSettings::default(),
            notes: NotesSettings::default(),
            video_cdn_urls: BTreeMap::new(),
            youtube_api_key: None,
            api_access_manager_email: None,
            api_access_from_email: None,
            enterprise: EnterpriseSettings::default(),
            retirement: RetirementSettings::default(),
            custom_courses_max_students: 200,
            search: SearchSettings::default(),
            sandbox: SandboxSettings::default(),
            grade_export: GradeExportConfig::default(),
        }
    }
}

impl ServiceSettings {
    pub(crate) fn apply(&mut self, doc: &Document) -> SettingsResult<()> {
        overlay(&mut self.comments.service_url, &doc.comments_service_url);
        overlay(&mut self.comments.service_key, &doc.comments_service_key);

        self.grading_queue = doc
            .grading_queue_interface
            .clone()
            .ok_or(SettingsError::missing_key("GRADING_QUEUE_INTERFACE"))?;

        overlay(&mut self.certificates.queue, &doc.cert_queue);
        overlay(&mut self.certificates.name_short, &doc.cert_name_short);
        overlay(&mut self.certificates.name_long, &doc.cert_name_long);

        overlay(&mut self.helpdesk.url, &doc.helpdesk_url);
        overlay(&mut self.helpdesk.user, &doc.helpdesk_user);
        overlay(&mut self.helpdesk.api_key, &doc.helpdesk_api_key);
        overlay(&mut self.helpdesk.custom_fields, &doc.helpdesk_custom_fields);

        overlay(&mut self.analytics.api_url, &doc.analytics_api_url);
        overlay(&mut self.analytics.api_key, &doc.analytics_api_key);

        overlay(&mut self.commerce.public_url_root, &doc.commerce_public_url_root);
        overlay(&mut self.commerce.api_url, &doc.commerce_api_url);
        overlay(&mut self.commerce.api_timeout_secs, &doc.commerce_api_timeout);
        overlay(
            &mut self.commerce.service_worker_username,
            &doc.commerce_service_worker_username,
        );

        overlay_opt(&mut self.catalog_api_url, &doc.course_catalog_api_url);

        overlay(&mut self.credit.help_link_url, &doc.credit_help_link_url);
        overlay(
            &mut self.credit.provider_secret_keys,
            &doc.credit_provider_secret_keys,
        );

        overlay(&mut self.notes.public_api, &doc.notes_public_api);
        overlay(&mut self.notes.internal_api, &doc.notes_internal_api);
        overlay(&mut self.notes.connect_timeout_secs, &doc.notes_connect_timeout);
        overlay(&mut self.notes.read_timeout_secs, &doc.notes_read_timeout);

        overlay(&mut self.video_cdn_urls, &doc.video_cdn_urls);
        overlay_opt(&mut self.youtube_api_key, &doc.youtube_api_key);
        overlay_opt(&mut self.api_access_manager_email, &doc.api_access_manager_email);
        overlay_opt(&mut self.api_access_from_email, &doc.api_access_from_email);

        overlay(&mut self.enterprise.support_url, &doc.enterprise_support_url);
        overlay_opt(
            &mut self.enterprise.reporting_secret,
            &doc.enterprise_reporting_secret,
        );
        overlay(
            &mut self.enterprise.service_worker_username,
            &doc.enterprise_service_worker_username,
        );
        overlay(
            &mut self.enterprise.api_cache_timeout_secs,
            &doc.enterprise_api_cache_timeout,
        );

        overlay(&mut self.retirement.username_prefix, &doc.retired_username_prefix);
        overlay(&mut self.retirement.email_prefix, &doc.retired_email_prefix);
        overlay(&mut self.retirement.email_domain, &doc.retired_email_domain);
        overlay(
            &mut self.retirement.service_worker_username,
            &doc.retirement_service_worker_username,
        );
        overlay(&mut self.retirement.user_salts, &doc.retired_user_salts);
        overlay(&mut self.retirement.states, &doc.retirement_states);

        overlay(
            &mut self.custom_courses_max_students,
            &doc.custom_courses_max_students_allowed,
        );
        overlay(&mut self.search.elastic_config, &doc.elastic_search_config);

        deep_merge(&mut self.sandbox.options, &doc.code_sandbox);
        overlay(&mut self.sandbox.unsafe_course_ids, &doc.courses_with_unsafe_code);

        overlay(&mut self.grade_export, &doc.grades_download);
        // Enterprise URLs and the grade export routing key resolve in the
        // derivation pass.
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
    fn test_grading_queue_is_required() {
        let doc = Document::from_yaml("{}").unwrap();
        let err = ServiceSettings::default().apply(&doc).unwrap_err();
        assert!(matches!(
            err,
            SettingsError::MissingKey {
                key: "GRADING_QUEUE_INTERFACE"
            }
        ));
    }

    fn doc_with_grading_queue(extra: &str) -> Document {
        let yaml = format!(
            r#"
            GRADING_QUEUE_INTERFACE:
              URL: http://grader.internal:18040
              AUTH_USER: lyceum
              AUTH_PASSWORD: secret
            {extra}"#
        );
        Document::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn test_grading_queue_from_document() {
        let mut services = ServiceSettings::default();
        services.apply(&doc_with_grading_queue("")).unwrap();

        assert_eq!(services.grading_queue.url, "http://grader.internal:18040");
        assert_eq!(services.grading_queue.auth_user, "lyceum");
        assert_eq!(services.grading_queue.basic_auth, None);
    }

    #[test]
    fn test_sandbox_deep_merge() {
        let doc = doc_with_grading_queue(
            r#"
            CODE_SANDBOX:
              python_bin: /opt/sandbox/bin/python
              limits:
                REALTIME: 5
            "#,
        );

        let mut services = ServiceSettings::default();
        services.apply(&doc).unwrap();

        let options = &services.sandbox.options;
        assert_eq!(options["python_bin"], Value::from("/opt/sandbox/bin/python"));
        let limits = options["limits"].as_mapping().unwrap();
        // Overridden sub-key replaced, siblings survive.
        assert_eq!(limits.get("REALTIME"), Some(&Value::from(5)));
        assert_eq!(limits.get("CPU"), Some(&Value::from(1)));
    }

    #[test]
    fn test_grade_export_defaults_fill_in() {
        let doc = doc_with_grading_queue(
            r#"
            GRADES_DOWNLOAD:
              STORAGE_TYPE: object_store
              BUCKET: lyceum-prod-grades
            "#,
        );

        let mut services = ServiceSettings::default();
        services.apply(&doc).unwrap();

        assert_eq!(services.grade_export.storage_type, "object_store");
        assert_eq!(services.grade_export.bucket, "lyceum-prod-grades");
        assert_eq!(services.grade_export.root_path, "/var/lyceum/grades");
    }
}
