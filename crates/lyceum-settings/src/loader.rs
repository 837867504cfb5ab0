//! Configuration document loading.
//!
//! The loader only decides *which* file to read and parses it; every
//! default, merge, and derivation belongs to [`crate::resolve`]. Selection
//! order:
//!
//! 1. a file set explicitly on the builder
//! 2. the path in `LYCEUM_CFG` (via [`EnvOverlay::document_path`])
//! 3. a search across the configured paths for variant-specific and then
//!    generic document names
//!
//! A path that was pointed at directly must exist; only the search step
//! tolerates absence.
//!
//! # Example
//!
//! ```rust,ignore
//! let env = EnvOverlay::from_env()?;
//! let document = DocumentLoader::new()
//!     .with_current_dir()
//!     .with_user_config_dir()
//!     .load(&env)?;
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::document::Document;
use crate::env::{CONFIG_PATH_VAR, EnvOverlay, ServiceVariant};
use crate::error::{SettingsError, SettingsResult};

/// Stem shared by all document names the search step considers.
const DOCUMENT_STEM: &str = "lyceum";

/// Locates and parses a configuration document.
pub struct DocumentLoader {
    /// Specific document to load (overrides search).
    config_file: Option<PathBuf>,
    /// Search paths for configuration documents.
    search_paths: Vec<PathBuf>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self {
            config_file: None,
            search_paths: Vec::new(),
        }
    }

    /// Sets a specific document to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds a search path for configuration documents.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user configuration directory to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join(DOCUMENT_STEM))
        } else {
            self
        }
    }

    /// Locates and parses the document for the given environment.
    pub fn load(&self, env: &EnvOverlay) -> SettingsResult<Document> {
        if let Some(path) = &self.config_file {
            return Self::read_document(path);
        }
        if let Some(path) = &env.document_path {
            return Self::read_document(path);
        }

        for dir in self.resolve_search_paths(env) {
            for name in candidate_names(&env.variant) {
                let candidate = dir.join(name);
                if candidate.exists() {
                    return Self::read_document(&candidate);
                }
                debug!(path = %candidate.display(), "no document at candidate path");
            }
        }
        Err(SettingsError::MissingEnvVar(CONFIG_PATH_VAR))
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self, env: &EnvOverlay) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(root) = &env.config_root {
            paths.push(root.clone());
        }
        paths.extend(self.search_paths.iter().cloned());
        paths
    }

    fn read_document(path: &Path) -> SettingsResult<Document> {
        if !path.exists() {
            return Err(SettingsError::DocumentNotFound(path.to_path_buf()));
        }
        info!(path = %path.display(), "loading configuration document");
        let text = std::fs::read_to_string(path)?;
        Document::from_yaml(&text)
    }
}

/// Document names in preference order: variant-specific first, then the
/// generic name, each with both YAML extensions.
fn candidate_names(variant: &ServiceVariant) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(name) = variant.name() {
        names.push(format!("{DOCUMENT_STEM}.{name}.yml"));
        names.push(format!("{DOCUMENT_STEM}.{name}.yaml"));
    }
    names.push(format!("{DOCUMENT_STEM}.yml"));
    names.push(format!("{DOCUMENT_STEM}.yaml"));
    names
}

/// Loads the document for the given environment with default search paths.
pub fn load_document(env: &EnvOverlay) -> SettingsResult<Document> {
    DocumentLoader::new()
        .with_current_dir()
        .with_user_config_dir()
        .load(env)
}

// ====== Tests ======

#[cfg(test)]
mod tests {
    use super::*;

    fn write_document(dir: &Path, name: &str, site_name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("SITE_NAME: {site_name}\n")).unwrap();
        path
    }

    #[test]
    fn test_explicit_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_document(dir.path(), "custom.yml", "explicit.example.edu");

        let doc = DocumentLoader::new()
            .file(&path)
            .load(&EnvOverlay::default())
            .unwrap();
        assert_eq!(doc.site_name.as_deref(), Some("explicit.example.edu"));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let err = DocumentLoader::new()
            .file("/nonexistent/lyceum.yml")
            .load(&EnvOverlay::default())
            .unwrap_err();
        assert!(matches!(err, SettingsError::DocumentNotFound(_)));
    }

    #[test]
    fn test_env_document_path_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_document(dir.path(), "pointed.yml", "pointed.example.edu");

        let env = EnvOverlay {
            document_path: Some(path),
            ..EnvOverlay::default()
        };
        let doc = DocumentLoader::new().load(&env).unwrap();
        assert_eq!(doc.site_name.as_deref(), Some("pointed.example.edu"));
    }

    #[test]
    fn test_variant_document_is_preferred() {
        let dir = tempfile::tempdir().unwrap();
        write_document(dir.path(), "lyceum.lms.yml", "lms.example.edu");
        write_document(dir.path(), "lyceum.yml", "generic.example.edu");

        let env = EnvOverlay::for_variant(ServiceVariant::named("lms"));
        let doc = DocumentLoader::new()
            .search_path(dir.path())
            .load(&env)
            .unwrap();
        assert_eq!(doc.site_name.as_deref(), Some("lms.example.edu"));
    }

    #[test]
    fn test_generic_document_fallback() {
        let dir = tempfile::tempdir().unwrap();
        write_document(dir.path(), "lyceum.yaml", "generic.example.edu");

        let env = EnvOverlay::for_variant(ServiceVariant::named("lms"));
        let doc = DocumentLoader::new()
            .search_path(dir.path())
            .load(&env)
            .unwrap();
        assert_eq!(doc.site_name.as_deref(), Some("generic.example.edu"));
    }

    #[test]
    fn test_config_root_is_searched_first() {
        let root = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        write_document(root.path(), "lyceum.yml", "root.example.edu");
        write_document(other.path(), "lyceum.yml", "other.example.edu");

        let env = EnvOverlay {
            config_root: Some(root.path().to_path_buf()),
            ..EnvOverlay::default()
        };
        let doc = DocumentLoader::new()
            .search_path(other.path())
            .load(&env)
            .unwrap();
        assert_eq!(doc.site_name.as_deref(), Some("root.example.edu"));
    }

    #[test]
    fn test_nothing_found_points_at_the_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let err = DocumentLoader::new()
            .search_path(dir.path())
            .load(&EnvOverlay::default())
            .unwrap_err();
        assert!(matches!(err, SettingsError::MissingEnvVar("LYCEUM_CFG")));
    }

    #[test]
    fn test_malformed_document_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lyceum.yml");
        std::fs::write(&path, "SITE_NAME: [unclosed\n").unwrap();

        let err = DocumentLoader::new()
            .file(&path)
            .load(&EnvOverlay::default())
            .unwrap_err();
        assert!(matches!(err, SettingsError::ParseError(_)));
    }
}
