//! Settings error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or resolving deployment settings.
///
/// All of these are fatal: settings are resolved once at process startup,
/// and a bad or incomplete document must abort the boot rather than run
/// the platform on partial configuration.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Document not found at the specified path.
    #[error("Configuration document not found: {0}")]
    DocumentNotFound(PathBuf),

    /// Failed to read the configuration document.
    #[error("Failed to read configuration document: {0}")]
    ReadError(#[from] std::io::Error),

    /// YAML parsing or extraction error.
    #[error("Failed to parse configuration document: {0}")]
    ParseError(String),

    /// Required environment variable is not set.
    #[error("Set the {0} environment variable")]
    MissingEnvVar(&'static str),

    /// Required document key missing.
    #[error("Missing required configuration key: {key}")]
    MissingKey { key: &'static str },

    /// A resolved value failed validation.
    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    /// The document names an attribute callback that was never registered.
    #[error("Unknown attribute callback: {0}")]
    UnknownCallback(String),

    /// A settings extension rejected the resolved state.
    #[error("Settings extension '{name}' failed: {source}")]
    ExtensionError {
        name: String,
        #[source]
        source: Box<SettingsError>,
    },
}

impl SettingsError {
    /// Creates a parse error from any displayable source.
    pub fn parse(err: impl std::fmt::Display) -> Self {
        Self::ParseError(err.to_string())
    }

    /// Creates a missing key error.
    pub fn missing_key(key: &'static str) -> Self {
        Self::MissingKey { key }
    }

    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Wraps an error raised by the named settings extension.
    pub fn extension(name: impl Into<String>, source: SettingsError) -> Self {
        Self::ExtensionError {
            name: name.into(),
            source: Box::new(source),
        }
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
