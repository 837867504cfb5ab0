//! Site identity, display, and theming settings.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_yaml::Value;

use crate::document::{Document, non_empty, non_empty_list};
use crate::error::{SettingsError, SettingsResult};
use crate::resolve::merge::{merge_map, overlay, overlay_opt};

/// Site identity and display settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSettings {
    /// Canonical host name of this deployment.
    pub site_name: String,
    /// Display name of the platform. Empty overrides keep the default.
    pub platform_name: String,
    /// One-line platform description shown in page metadata.
    pub platform_description: String,
    pub platform_twitter_account: String,
    pub platform_facebook_account: String,
    /// Host name of the authoring service.
    pub cms_base: String,
    /// Host name of the learner-facing service, if distinct from the site.
    pub lms_base: Option<String>,
    /// Public root URL, scheme included.
    pub root_url: Option<String>,
    /// Root URL used for service-to-service calls; defaults to the public one.
    pub internal_root_url: Option<String>,
    /// Host names this deployment will serve.
    pub allowed_hosts: Vec<String>,
    pub https: bool,
    pub time_zone: String,
    pub language_code: String,
    pub language_cookie: String,
    /// Released languages as (code, display name) pairs.
    pub languages: Vec<(String, String)>,
    pub use_i18n: bool,
    pub wiki_enabled: bool,
    pub support_site_link: String,
    /// Support links default to the general support site.
    pub id_verification_support_link: String,
    pub password_reset_support_link: String,
    pub activation_email_support_link: String,
    pub social_media_footer_urls: BTreeMap<String, String>,
    pub mobile_store_urls: BTreeMap<String, String>,
    pub footer_platform_url: String,
    pub footer_organization_image: String,
    pub footer_cache_timeout_secs: u64,
    pub footer_browser_cache_max_age_secs: u64,
    pub maintenance_banner_text: Option<String>,
    /// Revision tag shown in page footers and error reports.
    pub platform_revision: String,
    /// Registration form fields and whether each is required/optional/hidden.
    pub registration_extra_fields: BTreeMap<String, String>,
    pub registration_email_patterns_allowed: Option<Vec<String>>,
    /// Marketing site link names to URL slugs. Document entries merge in.
    pub mktg_url_link_map: BTreeMap<String, String>,
    pub mktg_urls: BTreeMap<String, String>,
    pub social_sharing_settings: BTreeMap<String, Value>,
    /// Merchant name on payment receipts; defaults to the platform name.
    pub merchant_name: String,
    pub parental_consent_age_limit: u8,
    pub course_catalog_visibility_permission: String,
    pub course_about_visibility_permission: String,
    pub default_course_visibility_in_catalog: String,
    pub default_course_about_image_url: String,
    pub default_mobile_available: bool,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            platform_name: "Lyceum".to_string(),
            platform_description: "The Lyceum open learning platform".to_string(),
            platform_twitter_account: "@LyceumEdu".to_string(),
            platform_facebook_account: "https://www.facebook.com/LyceumEdu".to_string(),
            cms_base: "studio.lyceum.education".to_string(),
            lms_base: None,
            root_url: None,
            internal_root_url: None,
            allowed_hosts: Vec::new(),
            https: true,
            time_zone: "UTC".to_string(),
            language_code: "en".to_string(),
            language_cookie: "lyceum-language-preference".to_string(),
            languages: vec![("en".to_string(), "English".to_string())],
            use_i18n: true,
            wiki_enabled: false,
            support_site_link: String::new(),
            id_verification_support_link: String::new(),
            password_reset_support_link: String::new(),
            activation_email_support_link: String::new(),
            social_media_footer_urls: BTreeMap::new(),
            mobile_store_urls: BTreeMap::new(),
            footer_platform_url: "https://lyceum.education".to_string(),
            footer_organization_image: "images/logo.png".to_string(),
            footer_cache_timeout_secs: 86400,
            footer_browser_cache_max_age_secs: 300,
            maintenance_banner_text: None,
            platform_revision: "release".to_string(),
            registration_extra_fields: default_registration_fields(),
            registration_email_patterns_allowed: None,
            mktg_url_link_map: default_mktg_links(),
            mktg_urls: BTreeMap::new(),
            social_sharing_settings: BTreeMap::new(),
            merchant_name: String::new(),
            parental_consent_age_limit: 13,
            course_catalog_visibility_permission: "see_exists".to_string(),
            course_about_visibility_permission: "see_exists".to_string(),
            default_course_visibility_in_catalog: "both".to_string(),
            default_course_about_image_url: "images/course_image.jpg".to_string(),
            default_mobile_available: false,
        }
    }
}

fn default_registration_fields() -> BTreeMap<String, String> {
    [
        ("confirm_email", "hidden"),
        ("level_of_education", "optional"),
        ("gender", "optional"),
        ("year_of_birth", "optional"),
        ("mailing_address", "optional"),
        ("goals", "optional"),
        ("honor_code", "required"),
        ("city", "hidden"),
        ("country", "hidden"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_mktg_links() -> BTreeMap<String, String> {
    [
        ("ABOUT", "about"),
        ("CONTACT", "contact"),
        ("HELP_CENTER", "help-center"),
        ("PRIVACY", "privacy"),
        ("TOS", "tos"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl SiteSettings {
    pub(crate) fn apply(&mut self, doc: &Document) -> SettingsResult<()> {
        self.site_name = doc
            .site_name
            .clone()
            .ok_or(SettingsError::missing_key("SITE_NAME"))?;

        // Display strings keep their defaults over explicitly empty overrides.
        if let Some(name) = non_empty(&doc.platform_name) {
            self.platform_name = name.to_string();
        }
        if let Some(description) = non_empty(&doc.platform_description) {
            self.platform_description = description.to_string();
        }

        overlay(&mut self.platform_twitter_account, &doc.platform_twitter_account);
        overlay(
            &mut self.platform_facebook_account,
            &doc.platform_facebook_account,
        );
        overlay(&mut self.cms_base, &doc.cms_base);
        overlay_opt(&mut self.lms_base, &doc.lms_base);
        overlay_opt(&mut self.root_url, &doc.lms_root_url);
        overlay(&mut self.https, &doc.https);
        overlay(&mut self.time_zone, &doc.time_zone);
        overlay(&mut self.language_code, &doc.language_code);
        overlay(&mut self.language_cookie, &doc.language_cookie);
        overlay(&mut self.languages, &doc.languages);
        overlay(&mut self.use_i18n, &doc.use_i18n);
        overlay(&mut self.wiki_enabled, &doc.wiki_enabled);
        overlay(&mut self.support_site_link, &doc.support_site_link);
        overlay(
            &mut self.social_media_footer_urls,
            &doc.social_media_footer_urls,
        );
        overlay(&mut self.mobile_store_urls, &doc.mobile_store_urls);
        overlay(&mut self.footer_platform_url, &doc.footer_platform_url);
        overlay(
            &mut self.footer_organization_image,
            &doc.footer_organization_image,
        );
        overlay(&mut self.footer_cache_timeout_secs, &doc.footer_cache_timeout);
        overlay(
            &mut self.footer_browser_cache_max_age_secs,
            &doc.footer_browser_cache_max_age,
        );
        overlay_opt(&mut self.maintenance_banner_text, &doc.maintenance_banner_text);
        overlay(&mut self.platform_revision, &doc.platform_revision);
        overlay(
            &mut self.registration_extra_fields,
            &doc.registration_extra_fields,
        );
        overlay_opt(
            &mut self.registration_email_patterns_allowed,
            &doc.registration_email_patterns_allowed,
        );
        merge_map(&mut self.mktg_url_link_map, &doc.mktg_url_link_map);
        overlay(&mut self.mktg_urls, &doc.mktg_urls);
        overlay(&mut self.social_sharing_settings, &doc.social_sharing_settings);
        overlay(
            &mut self.parental_consent_age_limit,
            &doc.parental_consent_age_limit,
        );
        overlay(
            &mut self.course_catalog_visibility_permission,
            &doc.course_catalog_visibility_permission,
        );
        overlay(
            &mut self.course_about_visibility_permission,
            &doc.course_about_visibility_permission,
        );
        overlay(
            &mut self.default_course_visibility_in_catalog,
            &doc.default_course_visibility_in_catalog,
        );
        overlay(
            &mut self.default_course_about_image_url,
            &doc.default_course_about_image_url,
        );
        overlay(&mut self.default_mobile_available, &doc.default_mobile_available);
        Ok(())
    }
}

/// Comprehensive theming settings.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ThemingSettings {
    pub enabled: bool,
    /// Directories searched for themes. An empty override keeps the default.
    pub theme_dirs: Vec<PathBuf>,
    pub locale_paths: Vec<PathBuf>,
    pub default_theme: Option<String>,
}

impl ThemingSettings {
    pub(crate) fn apply(&mut self, doc: &Document) {
        overlay(&mut self.enabled, &doc.enable_comprehensive_theming);
        if let Some(dirs) = non_empty_list(&doc.comprehensive_theme_dirs) {
            self.theme_dirs = dirs.to_vec();
        }
        overlay(&mut self.locale_paths, &doc.comprehensive_theme_locale_paths);
        overlay_opt(&mut self.default_theme, &doc.default_site_theme);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_name_is_required() {
        let doc = Document::from_yaml("PLATFORM_NAME: Academy").unwrap();
        let err = SiteSettings::default().apply(&doc).unwrap_err();
        assert!(matches!(err, SettingsError::MissingKey { key: "SITE_NAME" }));
    }

    #[test]
    fn test_empty_platform_name_keeps_default() {
        let doc = Document::from_yaml(
            r#"
            SITE_NAME: lyceum.example.edu
            PLATFORM_NAME: ""
            PLATFORM_DESCRIPTION: "A campus of one's own"
            "#,
        )
        .unwrap();

        let mut site = SiteSettings::default();
        site.apply(&doc).unwrap();

        assert_eq!(site.platform_name, "Lyceum");
        assert_eq!(site.platform_description, "A campus of one's own");
    }

    #[test]
    fn test_mktg_links_merge_per_key() {
        let doc = Document::from_yaml(
            r#"
            SITE_NAME: lyceum.example.edu
            MKTG_URL_LINK_MAP:
              ABOUT: who-we-are
              CAREERS: careers
            "#,
        )
        .unwrap();

        let mut site = SiteSettings::default();
        site.apply(&doc).unwrap();

        assert_eq!(site.mktg_url_link_map["ABOUT"], "who-we-are");
        assert_eq!(site.mktg_url_link_map["CAREERS"], "careers");
        // Untouched entries survive the merge.
        assert_eq!(site.mktg_url_link_map["TOS"], "tos");
    }

    #[test]
    fn test_empty_theme_dirs_keep_default() {
        let mut theming = ThemingSettings {
            theme_dirs: vec![PathBuf::from("/opt/lyceum/themes")],
            ..Default::default()
        };

        let doc = Document::from_yaml("COMPREHENSIVE_THEME_DIRS: []").unwrap();
        theming.apply(&doc);
        assert_eq!(theming.theme_dirs, [PathBuf::from("/opt/lyceum/themes")]);

        let doc = Document::from_yaml("COMPREHENSIVE_THEME_DIRS: [/srv/themes]").unwrap();
        theming.apply(&doc);
        assert_eq!(theming.theme_dirs, [PathBuf::from("/srv/themes")]);
    }
}
