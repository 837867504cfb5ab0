//! The deployment configuration document.
//!
//! A [`Document`] is the parsed form of the operator-authored YAML file
//! (`lyceum.yml`). Every field is optional: a key that is absent leaves the
//! built-in default untouched, while a key that is present overrides or
//! merges into it according to the rules in [`crate::resolve`]. The
//! document is inert data; nothing here consults the process environment
//! or derives values.
//!
//! Keys the schema does not know about are retained verbatim in
//! [`Document::extra`] so that settings extensions can read them and the
//! doctor can report them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use serde_yaml::Value;

use crate::error::{SettingsError, SettingsResult};
use crate::schema::{CacheConfig, DatabaseConfig, GradeExportConfig, GradingQueueInterface};

/// Deserializes a key that distinguishes "absent" from "explicitly null".
///
/// `None` means the key was not in the document at all; `Some(None)` means
/// the operator wrote `KEY: null`. The distinction matters for keys where
/// null is a meaningful opt-out rather than "use the default".
pub(crate) fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// Falsy-aware lookup: treats an explicitly empty string as absent.
///
/// Used for human-facing display strings where an empty override would
/// render blank text; the built-in default is kept instead.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Falsy-aware list lookup: treats an explicitly empty list as absent.
pub(crate) fn non_empty_list<T>(value: &Option<Vec<T>>) -> Option<&[T]> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// The operator-authored configuration document.
///
/// Field names mirror the SCREAMING_SNAKE_CASE keys of the YAML file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Document {
    // =========================================================================
    // Site identity and display
    // =========================================================================
    /// Canonical host name of this deployment. Required.
    pub site_name: Option<String>,
    pub platform_name: Option<String>,
    pub platform_description: Option<String>,
    pub platform_twitter_account: Option<String>,
    pub platform_facebook_account: Option<String>,
    pub cms_base: Option<String>,
    pub lms_base: Option<String>,
    pub lms_root_url: Option<String>,
    pub lms_internal_root_url: Option<String>,
    pub https: Option<bool>,
    pub time_zone: Option<String>,
    pub language_code: Option<String>,
    pub language_cookie: Option<String>,
    pub languages: Option<Vec<(String, String)>>,
    pub use_i18n: Option<bool>,
    pub wiki_enabled: Option<bool>,
    pub support_site_link: Option<String>,
    pub id_verification_support_link: Option<String>,
    pub password_reset_support_link: Option<String>,
    pub activation_email_support_link: Option<String>,
    pub social_media_footer_urls: Option<BTreeMap<String, String>>,
    pub mobile_store_urls: Option<BTreeMap<String, String>>,
    pub footer_platform_url: Option<String>,
    pub footer_organization_image: Option<String>,
    pub footer_cache_timeout: Option<u64>,
    pub footer_browser_cache_max_age: Option<u64>,
    pub maintenance_banner_text: Option<String>,
    pub platform_revision: Option<String>,
    pub registration_extra_fields: Option<BTreeMap<String, String>>,
    pub registration_email_patterns_allowed: Option<Vec<String>>,
    pub mktg_url_link_map: Option<BTreeMap<String, String>>,
    pub mktg_urls: Option<BTreeMap<String, String>>,
    pub social_sharing_settings: Option<BTreeMap<String, Value>>,
    pub cc_merchant_name: Option<String>,
    pub parental_consent_age_limit: Option<u8>,
    pub course_catalog_visibility_permission: Option<String>,
    pub course_about_visibility_permission: Option<String>,
    pub default_course_visibility_in_catalog: Option<String>,
    pub default_course_about_image_url: Option<String>,
    pub default_mobile_available: Option<bool>,

    // =========================================================================
    // Theming
    // =========================================================================
    pub comprehensive_theme_dirs: Option<Vec<PathBuf>>,
    pub comprehensive_theme_locale_paths: Option<Vec<PathBuf>>,
    pub default_site_theme: Option<String>,
    pub enable_comprehensive_theming: Option<bool>,

    // =========================================================================
    // Sessions, cookies, request security
    // =========================================================================
    pub session_engine: Option<String>,
    pub session_cookie_domain: Option<String>,
    pub session_cookie_name: Option<String>,
    pub session_cookie_httponly: Option<bool>,
    pub session_cookie_secure: Option<bool>,
    pub session_save_every_request: Option<bool>,
    pub session_inactivity_timeout_in_seconds: Option<u64>,
    pub logged_in_cookie_name: Option<String>,
    pub user_info_cookie_name: Option<String>,
    pub base_cookie_domain: Option<String>,
    pub affiliate_cookie_name: Option<String>,
    pub csrf_cookie_secure: Option<bool>,
    pub x_frame_options: Option<String>,
    pub login_redirect_whitelist: Option<Vec<String>>,

    // =========================================================================
    // Cross-origin resource sharing
    // =========================================================================
    pub cors_origin_whitelist: Option<Vec<String>>,
    pub cors_origin_allow_all: Option<bool>,
    pub cors_allow_insecure: Option<bool>,
    pub cross_domain_csrf_cookie_name: Option<String>,
    pub cross_domain_csrf_cookie_domain: Option<String>,

    // =========================================================================
    // Authentication
    // =========================================================================
    /// Signing key for sessions and tokens. Required.
    pub secret_key: Option<String>,
    pub internal_api_key: Option<String>,
    pub max_failed_login_attempts_allowed: Option<u32>,
    pub max_failed_login_attempts_lockout_period_secs: Option<u64>,
    pub auth_password_validators: Option<Vec<Value>>,
    pub cas_server_url: Option<String>,
    pub cas_extra_login_params: Option<BTreeMap<String, String>>,
    /// Identifier of a registered attribute callback, not a code path.
    pub cas_attribute_callback: Option<String>,
    pub third_party_auth_backends: Option<Vec<String>>,
    pub social_auth_pipeline_timeout: Option<u64>,
    pub saml_sp_private_key: Option<String>,
    pub saml_sp_public_cert: Option<String>,
    pub saml_sp_private_key_dict: Option<BTreeMap<String, String>>,
    pub saml_sp_public_cert_dict: Option<BTreeMap<String, String>>,
    pub social_auth_oauth_secrets: Option<BTreeMap<String, String>>,
    pub lti_consumer_secrets: Option<BTreeMap<String, String>>,
    /// `null` disables the periodic metadata fetch; absent keeps the default.
    #[serde(default, deserialize_with = "double_option")]
    pub third_party_auth_saml_fetch_period_hours: Option<Option<u64>>,
    pub third_party_auth_custom_auth_forms: Option<BTreeMap<String, Value>>,
    /// Required when the OAuth2 provider feature is enabled.
    pub oauth_oidc_issuer: Option<String>,
    pub oauth_enforce_secure: Option<bool>,
    pub oauth_enforce_client_secure: Option<bool>,
    pub oauth_expire_confidential_client_days: Option<u64>,
    pub oauth_expire_public_client_days: Option<u64>,
    pub oauth_id_token_expiration: Option<u64>,
    pub oauth_delete_expired: Option<bool>,
    pub jwt_auth: Option<BTreeMap<String, Value>>,
    pub lti_user_email_domain: Option<String>,
    pub lti_aggregate_score_passback_delay: Option<u64>,

    // =========================================================================
    // Email
    // =========================================================================
    pub email_backend: Option<String>,
    pub email_file_path: Option<String>,
    pub email_host: Option<String>,
    pub email_port: Option<u16>,
    pub email_use_tls: Option<bool>,
    pub email_host_user: Option<String>,
    pub email_host_password: Option<String>,
    pub default_from_email: Option<String>,
    pub default_feedback_email: Option<String>,
    pub server_email: Option<String>,
    pub tech_support_email: Option<String>,
    pub contact_email: Option<String>,
    pub bugs_email: Option<String>,
    pub payment_support_email: Option<String>,
    pub finance_email: Option<String>,
    pub university_email: Option<String>,
    pub press_email: Option<String>,
    pub contact_mailing_address: Option<String>,
    pub activation_email_from_address: Option<String>,
    pub admins: Option<Vec<(String, String)>>,
    pub feedback_submission_email: Option<String>,
    pub bulk_email_default_from_email: Option<String>,
    pub bulk_email_emails_per_task: Option<u32>,
    pub bulk_email_default_retry_delay: Option<u64>,
    pub bulk_email_max_retries: Option<u32>,
    pub bulk_email_infinite_retry_cap: Option<u32>,
    pub bulk_email_log_sent_emails: Option<bool>,
    pub bulk_email_retry_delay_between_sends: Option<f64>,
    pub bulk_email_routing_key: Option<String>,
    pub bulk_email_routing_key_small_jobs: Option<String>,

    // =========================================================================
    // Databases and caches
    // =========================================================================
    /// Relational database connections by alias. Required.
    pub databases: Option<BTreeMap<String, DatabaseConfig>>,
    /// Cache backends by alias. Required.
    pub caches: Option<BTreeMap<String, CacheConfig>>,

    // =========================================================================
    // File and object storage
    // =========================================================================
    pub static_root_base: Option<String>,
    pub static_url_base: Option<String>,
    pub media_root: Option<String>,
    pub media_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub default_file_storage: Option<String>,
    pub storage_access_key_id: Option<String>,
    pub storage_secret_access_key: Option<String>,
    pub storage_bucket_name: Option<String>,
    pub storage_querystring_auth: Option<bool>,
    pub storage_querystring_expire: Option<u64>,
    pub storage_custom_domain: Option<String>,
    pub file_upload_storage_bucket_name: Option<String>,
    pub file_upload_storage_prefix: Option<String>,
    pub student_fileupload_max_size: Option<u64>,
    pub asset_ignore_regex: Option<String>,
    pub assessment_file_prefix: Option<String>,

    // =========================================================================
    // Background workers
    // =========================================================================
    pub worker_broker_transport: Option<String>,
    pub worker_broker_user: Option<String>,
    pub worker_broker_password: Option<String>,
    pub worker_broker_hostname: Option<String>,
    pub worker_broker_vhost: Option<String>,
    pub worker_broker_use_ssl: Option<bool>,
    /// Wholesale replacement of the derived queue-name set.
    pub worker_queues: Option<Vec<String>>,
    /// Extra variants whose default queues this service may also consume.
    pub alternate_worker_queues: Option<Vec<String>>,
    pub worker_event_queue_ttl: Option<u64>,
    pub entitlements_expiration_routing_key: Option<String>,
    pub credentials_generation_routing_key: Option<String>,
    pub coursegraph_job_queue: Option<String>,
    pub grades_download_routing_key: Option<String>,
    pub grades_download: Option<GradeExportConfig>,
    pub policy_change_task_rate_limit: Option<String>,

    // =========================================================================
    // Event tracking and analytics
    // =========================================================================
    pub tracking_backends: Option<BTreeMap<String, Value>>,
    pub tracking_segmentio_emit_allowlist: Option<Vec<String>>,
    pub tracking_segmentio_webhook_secret: Option<String>,
    pub tracking_segmentio_allowed_types: Option<Vec<String>>,
    pub tracking_segmentio_disallowed_substring_names: Option<Vec<String>>,
    pub tracking_segmentio_source_map: Option<BTreeMap<String, String>>,
    pub tracking_ignore_url_patterns: Option<Vec<String>>,
    pub segment_key: Option<String>,
    pub google_analytics_account: Option<String>,
    pub google_analytics_tracking_id: Option<String>,
    pub google_site_verification_id: Option<String>,

    // =========================================================================
    // Companion services
    // =========================================================================
    pub comments_service_url: Option<String>,
    pub comments_service_key: Option<String>,
    /// External grading queue endpoint and credentials. Required.
    pub grading_queue_interface: Option<GradingQueueInterface>,
    pub cert_queue: Option<String>,
    pub cert_name_short: Option<String>,
    pub cert_name_long: Option<String>,
    pub helpdesk_url: Option<String>,
    pub helpdesk_user: Option<String>,
    pub helpdesk_api_key: Option<String>,
    pub helpdesk_custom_fields: Option<BTreeMap<String, Value>>,
    pub analytics_api_url: Option<String>,
    pub analytics_api_key: Option<String>,
    pub commerce_public_url_root: Option<String>,
    pub commerce_api_url: Option<String>,
    pub commerce_api_timeout: Option<u64>,
    pub commerce_service_worker_username: Option<String>,
    pub course_catalog_api_url: Option<String>,
    pub credit_help_link_url: Option<String>,
    pub credit_provider_secret_keys: Option<BTreeMap<String, Value>>,
    pub notes_public_api: Option<String>,
    pub notes_internal_api: Option<String>,
    pub notes_connect_timeout: Option<f64>,
    pub notes_read_timeout: Option<f64>,
    pub video_cdn_urls: Option<BTreeMap<String, String>>,
    pub youtube_api_key: Option<String>,
    pub api_access_manager_email: Option<String>,
    pub api_access_from_email: Option<String>,
    pub enterprise_api_url: Option<String>,
    pub enterprise_consent_api_url: Option<String>,
    pub enterprise_enrollment_api_url: Option<String>,
    pub enterprise_public_enrollment_api_url: Option<String>,
    pub enterprise_support_url: Option<String>,
    pub enterprise_reporting_secret: Option<String>,
    pub enterprise_service_worker_username: Option<String>,
    pub enterprise_api_cache_timeout: Option<u64>,
    pub retired_username_prefix: Option<String>,
    pub retired_email_prefix: Option<String>,
    pub retired_email_domain: Option<String>,
    pub retirement_service_worker_username: Option<String>,
    pub retired_user_salts: Option<Vec<String>>,
    pub retirement_states: Option<Vec<String>>,
    pub custom_courses_max_students_allowed: Option<u32>,
    pub elastic_search_config: Option<Vec<Value>>,

    // =========================================================================
    // Code sandbox
    // =========================================================================
    pub code_sandbox: Option<BTreeMap<String, Value>>,
    pub courses_with_unsafe_code: Option<Vec<String>>,
    pub component_settings: Option<BTreeMap<String, Value>>,

    // =========================================================================
    // Component registries
    // =========================================================================
    pub addl_installed_apps: Option<Vec<String>>,
    pub extra_middleware: Option<Vec<String>>,
    pub field_override_providers: Option<Vec<String>>,
    pub field_data_wrappers: Option<Vec<String>>,

    // =========================================================================
    // Feature flags
    // =========================================================================
    pub features: Option<BTreeMap<String, Value>>,

    // =========================================================================
    // Logging
    // =========================================================================
    pub local_loglevel: Option<String>,
    /// Directory for platform log files. Required.
    pub log_dir: Option<PathBuf>,
    /// Deployment tag stamped on log records. Required.
    pub logging_env: Option<String>,

    // =========================================================================
    // Everything else
    // =========================================================================
    /// Keys the schema does not model, kept for settings extensions.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Document {
    /// Parses a document from YAML text.
    pub fn from_yaml(text: &str) -> SettingsResult<Self> {
        serde_yaml::from_str(text).map_err(SettingsError::parse)
    }

    /// Looks up an unmodeled key retained in [`Document::extra`].
    pub fn get_extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Returns the unmodeled keys present in the document.
    pub fn extra_keys(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(String::as_str)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document() {
        let doc = Document::from_yaml("{}").unwrap();
        assert_eq!(doc, Document::default());
        assert!(doc.site_name.is_none());
        assert!(doc.extra.is_empty());
    }

    #[test]
    fn test_screaming_snake_keys() {
        let doc = Document::from_yaml(
            r#"
            SITE_NAME: lyceum.example.edu
            HTTPS: false
            SESSION_INACTIVITY_TIMEOUT_IN_SECONDS: 900
            LANGUAGES:
              - ["en", "English"]
              - ["fr", "French"]
            "#,
        )
        .unwrap();

        assert_eq!(doc.site_name.as_deref(), Some("lyceum.example.edu"));
        assert_eq!(doc.https, Some(false));
        assert_eq!(doc.session_inactivity_timeout_in_seconds, Some(900));
        assert_eq!(
            doc.languages.as_deref(),
            Some(&[("en".into(), "English".into()), ("fr".into(), "French".into())][..])
        );
    }

    #[test]
    fn test_unknown_keys_are_retained() {
        let doc = Document::from_yaml(
            r#"
            SITE_NAME: lyceum.example.edu
            SOME_PLUGIN_SETTING: 42
            "#,
        )
        .unwrap();

        assert_eq!(
            doc.get_extra("SOME_PLUGIN_SETTING"),
            Some(&Value::Number(42.into()))
        );
        assert_eq!(doc.extra_keys().collect::<Vec<_>>(), ["SOME_PLUGIN_SETTING"]);
    }

    #[test]
    fn test_null_is_distinct_from_absent() {
        let absent = Document::from_yaml("{}").unwrap();
        assert_eq!(absent.third_party_auth_saml_fetch_period_hours, None);

        let explicit_null =
            Document::from_yaml("THIRD_PARTY_AUTH_SAML_FETCH_PERIOD_HOURS: null").unwrap();
        assert_eq!(
            explicit_null.third_party_auth_saml_fetch_period_hours,
            Some(None)
        );

        let set = Document::from_yaml("THIRD_PARTY_AUTH_SAML_FETCH_PERIOD_HOURS: 6").unwrap();
        assert_eq!(set.third_party_auth_saml_fetch_period_hours, Some(Some(6)));
    }

    #[test]
    fn test_non_empty_helper() {
        assert_eq!(non_empty(&None), None);
        assert_eq!(non_empty(&Some(String::new())), None);
        assert_eq!(non_empty(&Some("Lyceum".into())), Some("Lyceum"));

        let empty: Option<Vec<PathBuf>> = Some(Vec::new());
        assert_eq!(non_empty_list(&empty), None);
        assert_eq!(non_empty_list::<PathBuf>(&None), None);
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        let err = Document::from_yaml("SITE_NAME: [unclosed").unwrap_err();
        assert!(matches!(err, SettingsError::ParseError(_)));
    }
}
