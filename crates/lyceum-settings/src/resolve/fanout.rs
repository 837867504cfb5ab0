//! Feature fan-out.
//!
//! Once the flag set is final, each enabled feature widens the resolved
//! settings: registering components, rewriting the authentication chain,
//! scheduling background tasks, or requiring keys that are optional when
//! the feature is off. Blocks run in a fixed order so a document always
//! produces the same result.

use crate::document::Document;
use crate::error::{SettingsError, SettingsResult};
use crate::registry::SettingsRegistry;
use crate::resolve::merge::overlay;
use crate::schema::{ScheduledTask, Settings};

const MODEL_AUTH_BACKEND: &str = "lyceum.auth.backends.ModelBackend";
const CAS_AUTH_BACKEND: &str = "lyceum.auth.backends.cas.CasBackend";
const CAS_APP: &str = "lyceum.apps.cas";
const CAS_MIDDLEWARE: &str = "lyceum.middleware.CasAuthentication";
const LTI_PROVIDER_APP: &str = "lyceum.apps.lti_provider";
const LTI_AUTH_BACKEND: &str = "lyceum.auth.backends.lti.LtiBackend";
const EXTENDED_HISTORY_APP: &str = "lyceum.apps.courseware_history_extended";
const CUSTOM_COURSES_APPS: &[&str] = &[
    "lyceum.apps.custom_courses",
    "lyceum.apps.custom_courses_connector",
];
const CUSTOM_COURSES_OVERRIDE_PROVIDER: &str =
    "lyceum.apps.custom_courses.overrides.CustomCoursesOverrideProvider";
const INDIVIDUAL_DUE_DATES_PROVIDER: &str =
    "lyceum.apps.courseware.overrides.IndividualStudentOverrideProvider";
const SELF_PACED_OVERRIDE_PROVIDER: &str =
    "lyceum.apps.courseware.overrides.SelfPacedDateOverrideProvider";
const FIELD_OVERRIDE_WRAPPER: &str =
    "lyceum.apps.courseware.field_overrides.OverrideFieldData.wrap";
const ELASTIC_SEARCH_ENGINE: &str = "lyceum.search.backends.elastic.ElasticEngine";

const SAML_METADATA_TASK_NAME: &str = "refresh-saml-metadata";
const SAML_METADATA_TASK: &str = "lyceum.auth.tasks.fetch_saml_metadata";
const DEFAULT_SAML_FETCH_PERIOD_HOURS: u64 = 24;

/// Headers every cross-origin deployment accepts, before the JWT cookie
/// header is appended.
const BASE_CORS_ALLOW_HEADERS: &[&str] = &[
    "accept",
    "accept-encoding",
    "authorization",
    "content-type",
    "dnt",
    "origin",
    "user-agent",
    "x-csrftoken",
    "x-requested-with",
];

pub(crate) fn apply(
    settings: &mut Settings,
    doc: &Document,
    registry: Option<&SettingsRegistry>,
) -> SettingsResult<()> {
    if settings.features.auth_use_cas() {
        apply_cas(settings, doc, registry)?;
    }
    if settings.features.third_party_auth() {
        apply_third_party_auth(settings, doc);
    }
    if settings.features.oauth2_provider() {
        apply_oauth2(settings, doc)?;
    }
    if settings.features.cors_headers() || settings.features.cross_domain_csrf_cookie() {
        apply_cors(settings, doc)?;
    }
    if settings.features.custom_courses() {
        let registries = &mut settings.registries;
        registries
            .installed_apps
            .extend(CUSTOM_COURSES_APPS.iter().map(|app| app.to_string()));
        registries
            .field_override_providers
            .push(CUSTOM_COURSES_OVERRIDE_PROVIDER.to_string());
    }
    if settings.features.individual_due_dates() {
        settings
            .registries
            .field_override_providers
            .push(INDIVIDUAL_DUE_DATES_PROVIDER.to_string());
    }
    if settings.features.lti_provider() {
        settings
            .registries
            .installed_apps
            .push(LTI_PROVIDER_APP.to_string());
        settings
            .registries
            .auth_backends
            .push(LTI_AUTH_BACKEND.to_string());
    }
    if settings.features.extended_history() {
        settings
            .registries
            .installed_apps
            .push(EXTENDED_HISTORY_APP.to_string());
    }
    if settings.features.any_search() {
        settings.services.search.engine = Some(ELASTIC_SEARCH_ENGINE.to_string());
    }

    // Self-paced date overrides ship on every deployment.
    settings
        .registries
        .field_data_wrappers
        .push(FIELD_OVERRIDE_WRAPPER.to_string());
    settings
        .registries
        .field_override_providers
        .push(SELF_PACED_OVERRIDE_PROVIDER.to_string());

    Ok(())
}

/// CAS replaces the authentication chain outright and hooks its middleware
/// into every request. The attribute callback is resolved through the
/// registry; a document naming an unregistered identifier is rejected.
fn apply_cas(
    settings: &mut Settings,
    doc: &Document,
    registry: Option<&SettingsRegistry>,
) -> SettingsResult<()> {
    settings.auth.cas.server_url = doc.cas_server_url.clone();
    if let Some(params) = &doc.cas_extra_login_params {
        settings.auth.cas.extra_login_params = params.clone();
    }
    if let Some(id) = &doc.cas_attribute_callback {
        let resolver = registry
            .and_then(|registry| registry.attribute_resolver(id))
            .ok_or_else(|| SettingsError::UnknownCallback(id.clone()))?;
        settings.auth.cas.attribute_resolver = Some(resolver);
    }

    settings.registries.auth_backends = vec![
        MODEL_AUTH_BACKEND.to_string(),
        CAS_AUTH_BACKEND.to_string(),
    ];
    settings.registries.installed_apps.push(CAS_APP.to_string());
    settings
        .registries
        .middleware
        .push(CAS_MIDDLEWARE.to_string());
    Ok(())
}

/// Third-party auth prepends its provider backends to the authentication
/// chain and schedules the SAML metadata refresh. An explicit `null` fetch
/// period in the document disables the refresh task entirely.
fn apply_third_party_auth(settings: &mut Settings, doc: &Document) {
    let third_party = &mut settings.auth.third_party;
    if let Some(backends) = &doc.third_party_auth_backends {
        third_party.backends = backends.clone();
    }
    overlay(
        &mut third_party.pipeline_timeout_secs,
        &doc.social_auth_pipeline_timeout,
    );
    overlay(
        &mut third_party.saml_sp_private_key,
        &doc.saml_sp_private_key,
    );
    overlay(
        &mut third_party.saml_sp_public_cert,
        &doc.saml_sp_public_cert,
    );
    if let Some(keys) = &doc.saml_sp_private_key_dict {
        third_party.saml_sp_private_key_dict = keys.clone();
    }
    if let Some(certs) = &doc.saml_sp_public_cert_dict {
        third_party.saml_sp_public_cert_dict = certs.clone();
    }
    if let Some(secrets) = &doc.social_auth_oauth_secrets {
        third_party.oauth_secrets = secrets.clone();
    }
    if let Some(secrets) = &doc.lti_consumer_secrets {
        third_party.lti_consumer_secrets = secrets.clone();
    }
    if let Some(forms) = &doc.third_party_auth_custom_auth_forms {
        third_party.custom_auth_forms = forms.clone();
    }

    let mut chain = third_party.backends.clone();
    chain.extend(settings.registries.auth_backends.iter().cloned());
    settings.registries.auth_backends = chain;

    let fetch_period = match doc.third_party_auth_saml_fetch_period_hours {
        None => Some(DEFAULT_SAML_FETCH_PERIOD_HOURS),
        Some(period) => period,
    };
    if let Some(hours) = fetch_period {
        if hours > 0 {
            settings.worker.beat_schedule.insert(
                SAML_METADATA_TASK_NAME.to_string(),
                ScheduledTask {
                    task: SAML_METADATA_TASK.to_string(),
                    every_hours: hours,
                },
            );
        }
    }
}

/// The OAuth2 provider cannot issue tokens without knowing its issuer.
fn apply_oauth2(settings: &mut Settings, doc: &Document) -> SettingsResult<()> {
    let oauth2 = &mut settings.auth.oauth2;
    oauth2.issuer = Some(
        doc.oauth_oidc_issuer
            .clone()
            .ok_or(SettingsError::missing_key("OAUTH_OIDC_ISSUER"))?,
    );
    overlay(&mut oauth2.enforce_secure, &doc.oauth_enforce_secure);
    overlay(
        &mut oauth2.enforce_client_secure,
        &doc.oauth_enforce_client_secure,
    );
    overlay(
        &mut oauth2.expire_confidential_client_days,
        &doc.oauth_expire_confidential_client_days,
    );
    overlay(
        &mut oauth2.expire_public_client_days,
        &doc.oauth_expire_public_client_days,
    );
    overlay(
        &mut oauth2.id_token_expiration_secs,
        &doc.oauth_id_token_expiration,
    );
    overlay(&mut oauth2.delete_expired, &doc.oauth_delete_expired);
    Ok(())
}

/// Cross-origin support turns on credentialed requests and widens the
/// accepted header set. The cross-domain CSRF cookie additionally requires
/// both its name and domain to be spelled out.
fn apply_cors(settings: &mut Settings, doc: &Document) -> SettingsResult<()> {
    let cors = &mut settings.cors;
    cors.allow_credentials = true;
    if let Some(whitelist) = &doc.cors_origin_whitelist {
        cors.origin_whitelist = whitelist.clone();
    }
    overlay(&mut cors.origin_allow_all, &doc.cors_origin_allow_all);
    overlay(&mut cors.allow_insecure, &doc.cors_allow_insecure);
    cors.allow_headers = BASE_CORS_ALLOW_HEADERS
        .iter()
        .map(|header| header.to_string())
        .chain(std::iter::once("use-jwt-cookie".to_string()))
        .collect();

    if settings.features.cross_domain_csrf_cookie() {
        cors.cross_domain_csrf_cookie_name = Some(
            doc.cross_domain_csrf_cookie_name
                .clone()
                .ok_or(SettingsError::missing_key("CROSS_DOMAIN_CSRF_COOKIE_NAME"))?,
        );
        cors.cross_domain_csrf_cookie_domain = Some(
            doc.cross_domain_csrf_cookie_domain
                .clone()
                .ok_or(SettingsError::missing_key(
                    "CROSS_DOMAIN_CSRF_COOKIE_DOMAIN",
                ))?,
        );
    }
    Ok(())
}

// ====== Tests ======
