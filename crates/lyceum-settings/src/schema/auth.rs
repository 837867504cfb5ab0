//! Authentication, SSO, and token settings.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::Value;

use crate::document::Document;
use crate::error::{SettingsError, SettingsResult};
use crate::registry::AttributeResolver;
use crate::resolve::merge::{merge_map, overlay, overlay_opt};

/// Provider backends offered when third-party auth is enabled and the
/// document does not name its own list.
pub(crate) const DEFAULT_PROVIDER_BACKENDS: &[&str] = &[
    "lyceum.auth.providers.google.GoogleOAuth2",
    "lyceum.auth.providers.facebook.FacebookOAuth2",
    "lyceum.auth.providers.microsoft.AzureADOAuth2",
    "lyceum.auth.providers.linkedin.LinkedinOAuth2",
    "lyceum.auth.providers.saml.SamlProvider",
    "lyceum.auth.providers.lti.LtiProvider",
];

/// Authentication settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSettings {
    /// Signing key for sessions and tokens.
    pub secret_key: String,
    /// Shared secret for trusted service-to-service calls.
    pub internal_api_key: Option<String>,
    pub max_failed_login_attempts: u32,
    pub lockout_period_secs: u64,
    /// Password policy entries, in the host framework's validator format.
    pub password_validators: Vec<Value>,
    pub cas: CasSettings,
    pub third_party: ThirdPartyAuthSettings,
    pub oauth2: OAuth2Settings,
    /// Token verification claims. Document entries merge in per key.
    pub jwt: BTreeMap<String, Value>,
    pub lti_provider: LtiProviderSettings,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            internal_api_key: None,
            max_failed_login_attempts: 6,
            lockout_period_secs: 1800,
            password_validators: Vec::new(),
            cas: CasSettings::default(),
            third_party: ThirdPartyAuthSettings::default(),
            oauth2: OAuth2Settings::default(),
            jwt: default_jwt_claims(),
            lti_provider: LtiProviderSettings::default(),
        }
    }
}

fn default_jwt_claims() -> BTreeMap<String, Value> {
    let mut claims = BTreeMap::new();
    claims.insert("JWT_ALGORITHM".to_string(), Value::from("HS256"));
    claims.insert("JWT_EXPIRATION_SECS".to_string(), Value::from(30));
    claims.insert("JWT_AUTH_COOKIE".to_string(), Value::from("lyceum-jwt"));
    claims
}

impl AuthSettings {
    pub(crate) fn apply(&mut self, doc: &Document) -> SettingsResult<()> {
        self.secret_key = doc
            .secret_key
            .clone()
            .ok_or(SettingsError::missing_key("SECRET_KEY"))?;

        overlay_opt(&mut self.internal_api_key, &doc.internal_api_key);
        overlay(
            &mut self.max_failed_login_attempts,
            &doc.max_failed_login_attempts_allowed,
        );
        overlay(
            &mut self.lockout_period_secs,
            &doc.max_failed_login_attempts_lockout_period_secs,
        );
        overlay(&mut self.password_validators, &doc.auth_password_validators);
        merge_map(&mut self.jwt, &doc.jwt_auth);
        self.lti_provider.apply(doc);
        Ok(())
    }
}

/// Central-authentication-service settings.
///
/// Filled by the feature fan-out when `AUTH_USE_CAS` is on; inert otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CasSettings {
    pub server_url: Option<String>,
    pub extra_login_params: BTreeMap<String, String>,
    /// Registered callback that maps CAS attributes onto the user profile.
    #[serde(skip)]
    pub attribute_resolver: Option<AttributeResolver>,
}

/// Third-party (social and institutional) authentication settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThirdPartyAuthSettings {
    /// Provider backends, tried in order.
    pub backends: Vec<String>,
    pub pipeline_timeout_secs: u64,
    pub saml_sp_private_key: String,
    pub saml_sp_public_cert: String,
    /// Per-provider key material, keyed by SAML entity slug.
    pub saml_sp_private_key_dict: BTreeMap<String, String>,
    pub saml_sp_public_cert_dict: BTreeMap<String, String>,
    pub oauth_secrets: BTreeMap<String, String>,
    pub lti_consumer_secrets: BTreeMap<String, String>,
    pub custom_auth_forms: BTreeMap<String, Value>,
}

impl Default for ThirdPartyAuthSettings {
    fn default() -> Self {
        Self {
            backends: DEFAULT_PROVIDER_BACKENDS
                .iter()
                .map(|b| (*b).to_string())
                .collect(),
            pipeline_timeout_secs: 600,
            saml_sp_private_key: String::new(),
            saml_sp_public_cert: String::new(),
            saml_sp_private_key_dict: BTreeMap::new(),
            saml_sp_public_cert_dict: BTreeMap::new(),
            oauth_secrets: BTreeMap::new(),
            lti_consumer_secrets: BTreeMap::new(),
            custom_auth_forms: BTreeMap::new(),
        }
    }
}

/// OAuth2 provider settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OAuth2Settings {
    /// Token issuer URL. Required when the provider feature is enabled.
    pub issuer: Option<String>,
    pub enforce_secure: bool,
    pub enforce_client_secure: bool,
    pub expire_confidential_client_days: u64,
    pub expire_public_client_days: u64,
    pub id_token_expiration_secs: u64,
    pub delete_expired: bool,
}

impl Default for OAuth2Settings {
    fn default() -> Self {
        Self {
            issuer: None,
            enforce_secure: true,
            enforce_client_secure: true,
            expire_confidential_client_days: 365,
            expire_public_client_days: 30,
            id_token_expiration_secs: 3600,
            delete_expired: true,
        }
    }
}

/// Settings for acting as an LTI tool provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LtiProviderSettings {
    /// Domain for the synthetic email of LTI-provisioned users.
    pub user_email_domain: String,
    /// Grace period before aggregate scores are passed back, in seconds.
    pub aggregate_score_passback_delay_secs: u64,
}

impl Default for LtiProviderSettings {
    fn default() -> Self {
        Self {
            user_email_domain: "lti.lyceum.education".to_string(),
            aggregate_score_passback_delay_secs: 900,
        }
    }
}

impl LtiProviderSettings {
    fn apply(&mut self, doc: &Document) {
        overlay(&mut self.user_email_domain, &doc.lti_user_email_domain);
        overlay(
            &mut self.aggregate_score_passback_delay_secs,
            &doc.lti_aggregate_score_passback_delay,
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
