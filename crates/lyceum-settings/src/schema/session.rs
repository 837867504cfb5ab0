//! Session, cookie, and cross-origin settings.

use serde::Serialize;

use crate::document::Document;
use crate::resolve::merge::{overlay, overlay_opt};

/// Session and cookie settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSettings {
    /// Session store backend.
    pub engine: String,
    pub cookie_domain: Option<String>,
    pub cookie_name: String,
    pub cookie_httponly: bool,
    pub cookie_secure: bool,
    pub save_every_request: bool,
    /// Idle sessions expire after this many seconds, when set.
    pub inactivity_timeout_secs: Option<u64>,
    /// Marker cookie the marketing site reads to adjust its header.
    pub logged_in_cookie_name: String,
    pub user_info_cookie_name: String,
    /// Domain shared by cross-service cookies.
    pub base_cookie_domain: Option<String>,
    pub affiliate_cookie_name: String,
    pub csrf_cookie_secure: bool,
    pub x_frame_options: String,
    /// Hosts login may redirect back to, beyond the site itself.
    pub login_redirect_whitelist: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            engine: "lyceum.sessions.backends.cache".to_string(),
            cookie_domain: None,
            cookie_name: "sessionid".to_string(),
            cookie_httponly: true,
            cookie_secure: false,
            save_every_request: false,
            inactivity_timeout_secs: None,
            logged_in_cookie_name: "lyceum_logged_in".to_string(),
            user_info_cookie_name: "lyceum-user-info".to_string(),
            base_cookie_domain: None,
            affiliate_cookie_name: "affiliate_id".to_string(),
            csrf_cookie_secure: false,
            x_frame_options: "DENY".to_string(),
            login_redirect_whitelist: Vec::new(),
        }
    }
}

impl SessionSettings {
    pub(crate) fn apply(&mut self, doc: &Document) {
        overlay(&mut self.engine, &doc.session_engine);
        overlay_opt(&mut self.cookie_domain, &doc.session_cookie_domain);
        overlay(&mut self.cookie_name, &doc.session_cookie_name);
        overlay(&mut self.cookie_httponly, &doc.session_cookie_httponly);
        overlay(&mut self.cookie_secure, &doc.session_cookie_secure);
        overlay(&mut self.save_every_request, &doc.session_save_every_request);
        overlay_opt(
            &mut self.inactivity_timeout_secs,
            &doc.session_inactivity_timeout_in_seconds,
        );
        overlay(&mut self.logged_in_cookie_name, &doc.logged_in_cookie_name);
        overlay(&mut self.user_info_cookie_name, &doc.user_info_cookie_name);
        overlay_opt(&mut self.base_cookie_domain, &doc.base_cookie_domain);
        overlay(&mut self.affiliate_cookie_name, &doc.affiliate_cookie_name);
        overlay(&mut self.csrf_cookie_secure, &doc.csrf_cookie_secure);
        overlay(&mut self.x_frame_options, &doc.x_frame_options);
        overlay(
            &mut self.login_redirect_whitelist,
            &doc.login_redirect_whitelist,
        );
    }
}

/// Cross-origin request settings.
///
/// These stay at their inert defaults unless the CORS or cross-domain CSRF
/// features are enabled; the feature fan-out fills them from the document.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CorsSettings {
    pub allow_credentials: bool,
    pub origin_whitelist: Vec<String>,
    pub origin_allow_all: bool,
    pub allow_insecure: bool,
    /// Request headers accepted cross-origin.
    pub allow_headers: Vec<String>,
    pub cross_domain_csrf_cookie_name: Option<String>,
    pub cross_domain_csrf_cookie_domain: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_overlays() {
        let doc = Document::from_yaml(
            r#"
            SESSION_COOKIE_DOMAIN: .lyceum.example.edu
            SESSION_COOKIE_SECURE: true
            SESSION_INACTIVITY_TIMEOUT_IN_SECONDS: 1800
            LOGIN_REDIRECT_WHITELIST: ["studio.lyceum.example.edu"]
            "#,
        )
        .unwrap();

        let mut session = SessionSettings::default();
        session.apply(&doc);

        assert_eq!(session.cookie_domain.as_deref(), Some(".lyceum.example.edu"));
        assert!(session.cookie_secure);
        assert_eq!(session.inactivity_timeout_secs, Some(1800));
        assert_eq!(
            session.login_redirect_whitelist,
            ["studio.lyceum.example.edu"]
        );
        // Untouched fields keep their defaults.
        assert_eq!(session.engine, "lyceum.sessions.backends.cache");
        assert!(session.cookie_httponly);
    }

    #[test]
    fn test_cors_defaults_are_inert() {
        let cors = CorsSettings::default();
        assert!(!cors.allow_credentials);
        assert!(!cors.origin_allow_all);
        assert!(cors.origin_whitelist.is_empty());
        assert!(cors.allow_headers.is_empty());
    }
}
