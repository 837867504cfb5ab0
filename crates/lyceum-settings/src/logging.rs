//! Log output setup.
//!
//! Settings resolution only *carries* log configuration; this module turns
//! resolved [`LogSettings`] into an installed `tracing` subscriber. Output
//! always goes to stderr, plus a per-variant file under the configured log
//! directory. With the `json-log` feature the file layer writes JSON
//! records for collector ingestion.
//!
//! ```rust,ignore
//! let settings = lyceum_settings::resolve(&document, &env)?;
//! lyceum_settings::logging::init_from_settings(&settings.logging, &env.variant);
//! ```

use std::path::PathBuf;

use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::env::ServiceVariant;
use crate::schema::LogSettings;

/// Initializes logging from resolved settings.
///
/// Uses `try_init` internally, so calling it with a subscriber already
/// installed is a no-op rather than a panic.
pub fn init_from_settings(settings: &LogSettings, variant: &ServiceVariant) {
    let builder = LoggingBuilder::new()
        .level(&settings.level)
        .log_dir(settings.dir.clone())
        .file_name(log_file_name(variant));
    let _ = builder.try_init();
}

/// Name of the log file a variant writes under the log directory.
fn log_file_name(variant: &ServiceVariant) -> String {
    match variant.name() {
        Some(name) => format!("lyceum.{name}.log"),
        None => "lyceum.log".to_string(),
    }
}

/// A builder for configuring log output.
pub struct LoggingBuilder {
    level: String,
    directives: Vec<String>,
    log_dir: Option<PathBuf>,
    file_name: String,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            log_dir: None,
            file_name: "lyceum.log".to_string(),
        }
    }

    /// Sets the base log level.
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Adds a filter directive such as `lyceum_settings=debug`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// Enables the file layer, writing into the given directory.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Sets the log file name used with [`LoggingBuilder::log_dir`].
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = name.into();
        self
    }

    /// Builds the filter from the level and directives.
    ///
    /// `RUST_LOG` takes precedence over the configured level, so operators
    /// can raise verbosity without editing the document.
    fn build_filter(&self) -> EnvFilter {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        for directive in &self.directives {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }

    /// Initializes the logging system.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Tries to initialize the logging system, returning an error on failure.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let stderr_layer = fmt::layer().compact().with_writer(std::io::stderr);

        match &self.log_dir {
            Some(dir) => {
                let appender = tracing_appender::rolling::never(dir, &self.file_name);
                #[cfg(feature = "json-log")]
                let file_layer = fmt::layer().json().with_writer(appender);
                #[cfg(not(feature = "json-log"))]
                let file_layer = fmt::layer().with_ansi(false).with_writer(appender);
                tracing_subscriber::registry()
                    .with(stderr_layer)
                    .with(file_layer)
                    .with(filter)
                    .try_init()
            }
            None => tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .try_init(),
        }
    }
}

// ====== Tests ======
