//! Static asset, media, and object-store settings.

use std::path::PathBuf;

use serde::Serialize;

use crate::document::Document;
use crate::resolve::merge::{overlay, overlay_opt};

/// File and object storage settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageSettings {
    /// Base directory for collected static assets, when serving locally.
    pub static_root_base: Option<String>,
    /// Derived: `{static_root_base}/staticfiles`.
    pub static_root: Option<PathBuf>,
    /// URL prefix for static assets. Always ends with a slash.
    pub static_url: String,
    pub media_root: String,
    pub media_url: String,
    /// Working directory for course data.
    pub data_dir: PathBuf,
    /// Derived: object-store backend when credentials exist, filesystem
    /// otherwise. A document override wins.
    pub default_file_storage: String,
    /// Object-store credentials. Empty strings normalize to absent.
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket_name: String,
    /// Sign object URLs with expiring query strings.
    pub querystring_auth: bool,
    pub querystring_expire_secs: u64,
    /// Serve objects from this domain instead of the store's own.
    pub custom_domain: Option<String>,
    pub upload_bucket_name: Option<String>,
    pub upload_prefix: String,
    pub student_file_upload_max_bytes: u64,
    /// Course asset paths matching this pattern are never imported.
    pub asset_ignore_regex: String,
    pub assessment_file_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            static_root_base: None,
            static_root: None,
            static_url: "/static/".to_string(),
            media_root: "/var/lyceum/media".to_string(),
            media_url: "/media/".to_string(),
            data_dir: PathBuf::from("/var/lyceum/data"),
            default_file_storage: FILESYSTEM_STORAGE.to_string(),
            access_key_id: None,
            secret_access_key: None,
            bucket_name: "lyceum-uploads".to_string(),
            querystring_auth: true,
            querystring_expire_secs: 604800,
            custom_domain: None,
            upload_bucket_name: None,
            upload_prefix: "submissions_attachments".to_string(),
            student_file_upload_max_bytes: 4 * 1024 * 1024,
            asset_ignore_regex: r"(^\._.*$)|(^\.DS_Store$)|(^.*~$)".to_string(),
            assessment_file_prefix: "assessments".to_string(),
        }
    }
}

/// Backend used when object-store credentials are configured.
pub(crate) const OBJECT_STORE_STORAGE: &str = "lyceum.storage.backends.object_store.ObjectStore";

/// Backend used without object-store credentials.
pub(crate) const FILESYSTEM_STORAGE: &str = "lyceum.storage.backends.filesystem.FileSystem";

impl StorageSettings {
    pub(crate) fn apply(&mut self, doc: &Document) {
        overlay_opt(&mut self.static_root_base, &doc.static_root_base);
        overlay(&mut self.media_root, &doc.media_root);
        overlay(&mut self.media_url, &doc.media_url);
        overlay(&mut self.data_dir, &doc.data_dir);

        // Empty credential strings mean "not configured", so that documents
        // templated from environments without an object store fall back to
        // filesystem storage.
        self.access_key_id = doc
            .storage_access_key_id
            .clone()
            .filter(|key| !key.is_empty());
        self.secret_access_key = doc
            .storage_secret_access_key
            .clone()
            .filter(|key| !key.is_empty());

        overlay(&mut self.bucket_name, &doc.storage_bucket_name);
        overlay(&mut self.querystring_auth, &doc.storage_querystring_auth);
        overlay(
            &mut self.querystring_expire_secs,
            &doc.storage_querystring_expire,
        );
        overlay_opt(&mut self.custom_domain, &doc.storage_custom_domain);
        overlay_opt(
            &mut self.upload_bucket_name,
            &doc.file_upload_storage_bucket_name,
        );
        overlay(&mut self.upload_prefix, &doc.file_upload_storage_prefix);
        overlay(
            &mut self.student_file_upload_max_bytes,
            &doc.student_fileupload_max_size,
        );
        overlay(&mut self.asset_ignore_regex, &doc.asset_ignore_regex);
        overlay(&mut self.assessment_file_prefix, &doc.assessment_file_prefix);
        // static_root, static_url, and default_file_storage finish in the
        // derivation pass.
    }

    /// True when both object-store credentials are configured.
    pub fn has_object_store(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_credentials_normalize_to_absent() {
        let doc = Document::from_yaml(
            r#"
            STORAGE_ACCESS_KEY_ID: ""
            STORAGE_SECRET_ACCESS_KEY: ""
            "#,
        )
        .unwrap();

        let mut storage = StorageSettings::default();
        storage.apply(&doc);

        assert_eq!(storage.access_key_id, None);
        assert_eq!(storage.secret_access_key, None);
        assert!(!storage.has_object_store());
    }

    #[test]
    fn test_configured_credentials() {
        let doc = Document::from_yaml(
            r#"
            STORAGE_ACCESS_KEY_ID: AKLYCEUM
            STORAGE_SECRET_ACCESS_KEY: shhh
            STORAGE_BUCKET_NAME: lyceum-prod-uploads
            "#,
        )
        .unwrap();

        let mut storage = StorageSettings::default();
        storage.apply(&doc);

        assert!(storage.has_object_store());
        assert_eq!(storage.bucket_name, "lyceum-prod-uploads");
    }
}
