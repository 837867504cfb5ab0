//! Final derivation pass.
//!
//! Runs after overrides, fan-out, and extensions, and fills every value
//! computed *from* other resolved values: queue names, the broker URL,
//! routing keys, derived URLs, and storage paths. Each value is recomputed
//! from the document and the already-resolved state, so running the pass
//! again over its own output changes nothing.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_yaml::{Mapping, Value};

use crate::document::Document;
use crate::schema::{QueueNames, Settings};
use crate::schema::{FILESYSTEM_STORAGE, OBJECT_STORE_STORAGE};

/// Name the collected static assets directory is appended under.
const STATIC_ASSETS_DIR: &str = "staticfiles";
/// Path suffix for the learner enrollment API.
const ENROLLMENT_API_PATH: &str = "/api/enrollment/v1/";
const ENTERPRISE_API_PATH: &str = "/enterprise/api/v1/";
const CONSENT_API_PATH: &str = "/consent/api/v1/";
/// Component entry that picks up licensing and video-source keys.
const VIDEO_COMPONENT: &str = "video";

pub(crate) fn finalize(settings: &mut Settings, doc: &Document) {
    finalize_site(settings, doc);
    finalize_storage(settings, doc);
    finalize_queues(settings, doc);
    finalize_routing(settings, doc);
    finalize_enterprise(settings, doc);
    finalize_components(settings);
}

fn finalize_site(settings: &mut Settings, doc: &Document) {
    let site = &mut settings.site;
    site.internal_root_url = doc
        .lms_internal_root_url
        .clone()
        .or_else(|| site.root_url.clone());
    site.merchant_name = doc
        .cc_merchant_name
        .clone()
        .unwrap_or_else(|| site.platform_name.clone());

    // Specialized support links fall back to the general support site.
    site.id_verification_support_link = doc
        .id_verification_support_link
        .clone()
        .unwrap_or_else(|| site.support_site_link.clone());
    site.password_reset_support_link = doc
        .password_reset_support_link
        .clone()
        .unwrap_or_else(|| site.support_site_link.clone());
    site.activation_email_support_link = doc
        .activation_email_support_link
        .clone()
        .unwrap_or_else(|| site.support_site_link.clone());

    let mut hosts = vec!["*".to_string()];
    hosts.extend(site.lms_base.clone());
    if let Some(preview) = settings.features.preview_base() {
        hosts.push(preview.to_string());
    }
    settings.site.allowed_hosts = hosts;
}

fn finalize_storage(settings: &mut Settings, doc: &Document) {
    let storage = &mut settings.storage;
    storage.static_root = storage
        .static_root_base
        .as_ref()
        .map(|base| PathBuf::from(base).join(STATIC_ASSETS_DIR));

    if let Some(base) = &doc.static_url_base {
        storage.static_url = if base.ends_with('/') {
            base.clone()
        } else {
            format!("{base}/")
        };
    }

    storage.default_file_storage = doc.default_file_storage.clone().unwrap_or_else(|| {
        if storage.has_object_store() {
            OBJECT_STORE_STORAGE.to_string()
        } else {
            FILESYSTEM_STORAGE.to_string()
        }
    });
}

fn finalize_queues(settings: &mut Settings, doc: &Document) {
    let worker = &mut settings.worker;
    let queue_variant = settings.config_prefix.to_lowercase();
    let prefix = format!("{}.{}", worker.queue_namespace, queue_variant);

    let names = QueueNames::for_prefix(&prefix);
    worker.default_exchange = format!("{prefix}core");
    worker.default_queue = names.default_priority.clone();
    worker.default_routing_key = names.default_priority.clone();

    let mut queues: BTreeSet<String> = match &doc.worker_queues {
        Some(list) => list.iter().cloned().collect(),
        None => names.iter().map(str::to_string).collect(),
    };
    // Consuming another variant's default queue lets one worker serve
    // several services. The set folds duplicates away.
    for alternate in &worker.alternate_queue_variants {
        let alternate_prefix = format!("{}.{}.", worker.queue_namespace, alternate.to_lowercase());
        queues.insert(QueueNames::for_prefix(&alternate_prefix).default_priority);
    }
    worker.queues = queues;

    worker.high_priority_queue = names.high_priority;
    worker.default_priority_queue = names.default_priority;
    worker.high_mem_queue = names.high_mem;
    worker.broker_url = worker.broker.url();
}

fn finalize_routing(settings: &mut Settings, doc: &Document) {
    let worker = &mut settings.worker;

    // Bulk email defaults to the high-mem queue so one large course cannot
    // starve everything else; small jobs keep the default queue.
    settings.email.bulk.routing_key = doc
        .bulk_email_routing_key
        .clone()
        .unwrap_or_else(|| worker.high_mem_queue.clone());
    settings.email.bulk.routing_key_small_jobs = doc
        .bulk_email_routing_key_small_jobs
        .clone()
        .unwrap_or_else(|| worker.default_priority_queue.clone());

    worker.routing.grades_download = doc
        .grades_download_routing_key
        .clone()
        .unwrap_or_else(|| worker.high_mem_queue.clone());
    worker.routing.entitlements_expiration = doc
        .entitlements_expiration_routing_key
        .clone()
        .unwrap_or_else(|| worker.default_priority_queue.clone());
    worker.routing.credentials_generation = doc
        .credentials_generation_routing_key
        .clone()
        .unwrap_or_else(|| worker.default_priority_queue.clone());
    worker.routing.coursegraph_jobs = doc
        .coursegraph_job_queue
        .clone()
        .unwrap_or_else(|| worker.default_priority_queue.clone());
}

fn finalize_enterprise(settings: &mut Settings, doc: &Document) {
    let enterprise = &mut settings.services.enterprise;
    let root = settings.site.root_url.as_deref();
    let internal = settings.site.internal_root_url.as_deref();

    enterprise.public_enrollment_api_url = doc
        .enterprise_public_enrollment_api_url
        .clone()
        .or_else(|| root.map(|url| format!("{url}{ENROLLMENT_API_PATH}")));
    enterprise.enrollment_api_url = doc
        .enterprise_enrollment_api_url
        .clone()
        .or_else(|| internal.map(|url| format!("{url}{ENROLLMENT_API_PATH}")));
    enterprise.api_url = doc
        .enterprise_api_url
        .clone()
        .or_else(|| internal.map(|url| format!("{url}{ENTERPRISE_API_PATH}")));
    enterprise.consent_api_url = doc
        .enterprise_consent_api_url
        .clone()
        .or_else(|| internal.map(|url| format!("{url}{CONSENT_API_PATH}")));
}

/// The video component always carries the licensing flag and, when
/// configured, the external video source key.
fn finalize_components(settings: &mut Settings) {
    let licensing = settings.features.licensing();
    let youtube_api_key = settings.services.youtube_api_key.clone();

    let entry = settings
        .registries
        .component_settings
        .entry(VIDEO_COMPONENT.to_string())
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !matches!(entry, Value::Mapping(_)) {
        *entry = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = entry {
        map.insert(
            Value::from("licensing_enabled"),
            Value::Bool(licensing),
        );
        if let Some(key) = youtube_api_key {
            map.insert(Value::from("youtube_api_key"), Value::String(key));
        }
    }
}

// ====== Tests ======

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names_derive_from_namespace_and_variant() {
        let mut settings = Settings::default();
        settings.config_prefix = "lms.".to_string();
        let doc = Document::default();

        finalize(&mut settings, &doc);

        assert_eq!(settings.worker.default_priority_queue, "lyceum.lms.core.default");
        assert_eq!(settings.worker.high_priority_queue, "lyceum.lms.core.high");
        assert_eq!(settings.worker.high_mem_queue, "lyceum.lms.core.high_mem");
        assert_eq!(settings.worker.default_exchange, "lyceum.lms.core");
        assert_eq!(settings.worker.default_queue, "lyceum.lms.core.default");
        assert_eq!(settings.worker.queues.len(), 3);
    }

    #[test]
    fn test_alternate_variants_add_their_default_queues() {
        let mut settings = Settings::default();
        settings
            .worker
            .alternate_queue_variants
            .push("CMS".to_string());
        let doc = Document::default();

        finalize(&mut settings, &doc);

        assert!(settings.worker.queues.contains("lyceum.cms.core.default"));
        assert_eq!(settings.worker.queues.len(), 4);
    }

    #[test]
    fn test_duplicate_alternate_queue_folds_away() {
        let mut settings = Settings::default();
        settings
            .worker
            .alternate_queue_variants
            .extend(["cms".to_string(), "cms".to_string()]);
        let doc = Document::default();

        finalize(&mut settings, &doc);
        assert_eq!(settings.worker.queues.len(), 4);
    }

    #[test]
    fn test_document_queue_list_replaces_derived_set() {
        let mut settings = Settings::default();
        let doc = Document::from_yaml("WORKER_QUEUES:\n  - custom.q1\n  - custom.q2").unwrap();

        finalize(&mut settings, &doc);

        assert_eq!(
            settings.worker.queues.iter().collect::<Vec<_>>(),
            ["custom.q1", "custom.q2"]
        );
    }

    #[test]
    fn test_routing_keys_default_to_derived_queues() {
        let mut settings = Settings::default();
        let doc = Document::default();

        finalize(&mut settings, &doc);

        assert_eq!(settings.email.bulk.routing_key, "lyceum.core.high_mem");
        assert_eq!(
            settings.email.bulk.routing_key_small_jobs,
            "lyceum.core.default"
        );
        assert_eq!(settings.worker.routing.grades_download, "lyceum.core.high_mem");
        assert_eq!(
            settings.worker.routing.entitlements_expiration,
            "lyceum.core.default"
        );
    }

    #[test]
    fn test_routing_key_document_override_wins() {
        let mut settings = Settings::default();
        let doc = Document::from_yaml("BULK_EMAIL_ROUTING_KEY: bulk.custom").unwrap();

        finalize(&mut settings, &doc);
        assert_eq!(settings.email.bulk.routing_key, "bulk.custom");
    }

    #[test]
    fn test_internal_root_url_falls_back_to_public() {
        let mut settings = Settings::default();
        settings.site.root_url = Some("https://lyceum.example.edu".to_string());
        let doc = Document::default();

        finalize(&mut settings, &doc);
        assert_eq!(
            settings.site.internal_root_url.as_deref(),
            Some("https://lyceum.example.edu")
        );
    }

    #[test]
    fn test_enterprise_urls_derive_from_roots() {
        let mut settings = Settings::default();
        settings.site.root_url = Some("https://lyceum.example.edu".to_string());
        let doc = Document::from_yaml("LMS_INTERNAL_ROOT_URL: http://lms.internal").unwrap();

        finalize(&mut settings, &doc);

        assert_eq!(
            settings.services.enterprise.public_enrollment_api_url.as_deref(),
            Some("https://lyceum.example.edu/api/enrollment/v1/")
        );
        assert_eq!(
            settings.services.enterprise.enrollment_api_url.as_deref(),
            Some("http://lms.internal/api/enrollment/v1/")
        );
        assert_eq!(
            settings.services.enterprise.api_url.as_deref(),
            Some("http://lms.internal/enterprise/api/v1/")
        );
        assert_eq!(
            settings.services.enterprise.consent_api_url.as_deref(),
            Some("http://lms.internal/consent/api/v1/")
        );
    }

    #[test]
    fn test_allowed_hosts_include_bases() {
        let mut settings = Settings::default();
        settings.site.lms_base = Some("lyceum.example.edu".to_string());
        settings
            .features
            .set("PREVIEW_LMS_BASE", "preview.lyceum.example.edu");
        let doc = Document::default();

        finalize(&mut settings, &doc);

        assert_eq!(
            settings.site.allowed_hosts,
            ["*", "lyceum.example.edu", "preview.lyceum.example.edu"]
        );
    }

    #[test]
    fn test_static_url_base_gains_trailing_slash() {
        let mut settings = Settings::default();
        let doc = Document::from_yaml("STATIC_URL_BASE: /assets").unwrap();

        finalize(&mut settings, &doc);
        assert_eq!(settings.storage.static_url, "/assets/");
    }

    #[test]
    fn test_static_root_derives_from_base() {
        let mut settings = Settings::default();
        settings.storage.static_root_base = Some("/var/lyceum".to_string());
        let doc = Document::default();

        finalize(&mut settings, &doc);
        assert_eq!(
            settings.storage.static_root,
            Some(PathBuf::from("/var/lyceum/staticfiles"))
        );
    }

    #[test]
    fn test_default_file_storage_follows_credentials() {
        let mut settings = Settings::default();
        let doc = Document::default();
        finalize(&mut settings, &doc);
        assert_eq!(settings.storage.default_file_storage, FILESYSTEM_STORAGE);

        settings.storage.access_key_id = Some("AKLYCEUM".to_string());
        settings.storage.secret_access_key = Some("shhh".to_string());
        finalize(&mut settings, &doc);
        assert_eq!(settings.storage.default_file_storage, OBJECT_STORE_STORAGE);
    }

    #[test]
    fn test_video_component_settings_are_injected() {
        let mut settings = Settings::default();
        settings.features.set("LICENSING", true);
        settings.services.youtube_api_key = Some("yt-key".to_string());
        let doc = Document::default();

        finalize(&mut settings, &doc);

        let video = settings
            .registries
            .component_settings
            .get("video")
            .and_then(Value::as_mapping)
            .unwrap();
        assert_eq!(video.get("licensing_enabled"), Some(&Value::Bool(true)));
        assert_eq!(
            video.get("youtube_api_key"),
            Some(&Value::String("yt-key".to_string()))
        );
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let mut settings = Settings::default();
        settings.site.lms_base = Some("lyceum.example.edu".to_string());
        settings.config_prefix = "lms.".to_string();
        let doc = Document::from_yaml("ALTERNATE_WORKER_QUEUES:\n  - cms").unwrap();
        settings.worker.apply(&doc);

        finalize(&mut settings, &doc);
        let first = settings.clone();
        finalize(&mut settings, &doc);
        assert_eq!(settings, first);
    }
}
