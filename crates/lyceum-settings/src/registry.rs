//! Deployment extension points.
//!
//! A [`SettingsRegistry`] holds the callbacks a deployment wires in before
//! resolving its settings: attribute resolvers the document may reference
//! by identifier, and [`SettingsExtension`] hooks that run after the
//! built-in passes. The registry is populated in code at startup; the
//! configuration document can only select from what was registered, never
//! name arbitrary code.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::document::Document;
use crate::error::{SettingsError, SettingsResult};
use crate::schema::Settings;

/// User profile assembled from the attributes of a single-sign-on ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoProfile {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
}

/// Maps raw attribute pairs from an SSO handshake to a user profile.
///
/// Resolvers are plain function pointers so the resolved [`Settings`] stay
/// comparable and cloneable.
pub type AttributeResolver = fn(&BTreeMap<String, String>) -> SsoProfile;

/// A hook that adjusts resolved settings on behalf of a deployment add-on.
///
/// Extensions run in registration order, after every built-in pass except
/// final derivation and validation, so anything they write is still subject
/// to both.
pub trait SettingsExtension {
    /// Stable name used in logs and error reports.
    fn name(&self) -> &str;

    /// Adjusts `settings`, reading anything it needs from the document.
    fn apply(&self, settings: &mut Settings, document: &Document) -> SettingsResult<()>;
}

/// Registered extensions and attribute resolvers.
#[derive(Default)]
pub struct SettingsRegistry {
    extensions: Vec<Box<dyn SettingsExtension>>,
    attribute_resolvers: HashMap<String, AttributeResolver>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extension hook. Hooks run in registration order.
    pub fn register<E: SettingsExtension + 'static>(&mut self, extension: E) -> &mut Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Registers an attribute resolver under the identifier documents use
    /// to select it.
    pub fn register_attribute_resolver(
        &mut self,
        id: impl Into<String>,
        resolver: AttributeResolver,
    ) -> &mut Self {
        self.attribute_resolvers.insert(id.into(), resolver);
        self
    }

    /// Looks up a resolver by the identifier a document referenced.
    pub fn attribute_resolver(&self, id: &str) -> Option<AttributeResolver> {
        self.attribute_resolvers.get(id).copied()
    }

    /// Names of the registered extensions, in the order they will run.
    pub fn extension_names(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(|extension| extension.name())
    }

    pub(crate) fn run_extensions(
        &self,
        settings: &mut Settings,
        document: &Document,
    ) -> SettingsResult<()> {
        for extension in &self.extensions {
            debug!(extension = extension.name(), "applying settings extension");
            extension
                .apply(settings, document)
                .map_err(|source| SettingsError::extension(extension.name(), source))?;
        }
        Ok(())
    }
}

// ====== Tests ======

#[cfg(test)]
mod tests {
    use super::*;

    struct BannerExtension;

    impl SettingsExtension for BannerExtension {
        fn name(&self) -> &str {
            "banner"
        }

        fn apply(&self, settings: &mut Settings, _document: &Document) -> SettingsResult<()> {
            settings.features.set("BANNER", true);
            Ok(())
        }
    }

    struct FailingExtension;

    impl SettingsExtension for FailingExtension {
        fn name(&self) -> &str {
            "failing"
        }

        fn apply(&self, _settings: &mut Settings, _document: &Document) -> SettingsResult<()> {
            Err(SettingsError::validation("refused"))
        }
    }

    fn resolve_plain(attributes: &BTreeMap<String, String>) -> SsoProfile {
        SsoProfile {
            username: attributes.get("uid").cloned().unwrap_or_default(),
            email: attributes.get("mail").cloned().unwrap_or_default(),
            full_name: attributes.get("cn").cloned(),
        }
    }

    #[test]
    fn test_extensions_run_in_registration_order() {
        let mut registry = SettingsRegistry::new();
        registry.register(BannerExtension);
        let mut settings = Settings::default();
        let document = Document::default();

        registry.run_extensions(&mut settings, &document).unwrap();
        assert!(settings.features.enabled("BANNER"));
        assert_eq!(registry.extension_names().collect::<Vec<_>>(), ["banner"]);
    }

    #[test]
    fn test_extension_failure_is_attributed() {
        let mut registry = SettingsRegistry::new();
        registry.register(FailingExtension);
        let mut settings = Settings::default();
        let document = Document::default();

        let err = registry
            .run_extensions(&mut settings, &document)
            .unwrap_err();
        match err {
            SettingsError::ExtensionError { name, .. } => assert_eq!(name, "failing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_attribute_resolver_lookup() {
        let mut registry = SettingsRegistry::new();
        registry.register_attribute_resolver("plain", resolve_plain);

        let resolver = registry.attribute_resolver("plain").unwrap();
        let mut attributes = BTreeMap::new();
        attributes.insert("uid".to_string(), "learner".to_string());
        attributes.insert("mail".to_string(), "learner@example.com".to_string());

        let profile = resolver(&attributes);
        assert_eq!(profile.username, "learner");
        assert_eq!(profile.email, "learner@example.com");
        assert_eq!(profile.full_name, None);
        assert!(registry.attribute_resolver("other").is_none());
    }
}
