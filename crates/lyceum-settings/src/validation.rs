//! Final validation pass.
//!
//! Runs over fully derived settings, after documents, fan-out, extensions,
//! and derivation have all had their say. Checks here catch states no
//! single pass can see on its own, such as an extension hook emptying a
//! value a document was required to provide.

use crate::error::{SettingsError, SettingsResult};
use crate::schema::Settings;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub(crate) fn validate(settings: &Settings) -> SettingsResult<()> {
    validate_identity(settings)?;
    validate_stores(settings)?;
    validate_logging(settings)?;
    validate_limits(settings)?;
    validate_routing(settings)?;
    Ok(())
}

fn validate_identity(settings: &Settings) -> SettingsResult<()> {
    if settings.site.site_name.is_empty() {
        return Err(SettingsError::validation("SITE_NAME must not be empty"));
    }
    if settings.auth.secret_key.is_empty() {
        return Err(SettingsError::validation("SECRET_KEY must not be empty"));
    }
    if let Some(issuer) = &settings.auth.oauth2.issuer {
        if issuer.is_empty() {
            return Err(SettingsError::validation(
                "OAUTH_OIDC_ISSUER must not be empty",
            ));
        }
    }
    Ok(())
}

fn validate_stores(settings: &Settings) -> SettingsResult<()> {
    if settings.database.databases.is_empty() {
        return Err(SettingsError::validation(
            "at least one database connection is required",
        ));
    }
    if settings.database.caches.is_empty() {
        return Err(SettingsError::validation(
            "at least one cache backend is required",
        ));
    }
    Ok(())
}

fn validate_logging(settings: &Settings) -> SettingsResult<()> {
    if !LOG_LEVELS.contains(&settings.logging.level.as_str()) {
        return Err(SettingsError::validation(format!(
            "unknown log level {:?}",
            settings.logging.level
        )));
    }
    if settings.logging.dir.as_os_str().is_empty() {
        return Err(SettingsError::validation("LOG_DIR must not be empty"));
    }
    Ok(())
}

fn validate_limits(settings: &Settings) -> SettingsResult<()> {
    if settings.email.port == 0 {
        return Err(SettingsError::validation("EMAIL_PORT must be a usable port"));
    }
    if settings.auth.lockout_period_secs == 0 {
        return Err(SettingsError::validation(
            "login lockout period must be positive",
        ));
    }
    if settings.session.inactivity_timeout_secs == Some(0) {
        return Err(SettingsError::validation(
            "session inactivity timeout cannot be zero; omit it to disable",
        ));
    }
    Ok(())
}

fn validate_routing(settings: &Settings) -> SettingsResult<()> {
    let keys = [
        ("bulk email", &settings.email.bulk.routing_key),
        (
            "bulk email small jobs",
            &settings.email.bulk.routing_key_small_jobs,
        ),
        (
            "entitlements expiration",
            &settings.worker.routing.entitlements_expiration,
        ),
        (
            "credentials generation",
            &settings.worker.routing.credentials_generation,
        ),
        ("grades download", &settings.worker.routing.grades_download),
        ("coursegraph jobs", &settings.worker.routing.coursegraph_jobs),
    ];
    for (what, key) in keys {
        if key.is_empty() {
            return Err(SettingsError::validation(format!(
                "{what} routing key must not be empty"
            )));
        }
    }
    Ok(())
}

// ====== Tests ======
