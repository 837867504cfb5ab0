//! Lyceum Settings - layered deployment-settings resolution for the
//! Lyceum learning platform.
//!
//! This crate provides:
//! - A typed schema of every platform setting with its shipped default
//!   (`Settings` and its groups)
//! - Configuration document parsing (`Document`, `DocumentLoader`)
//! - The resolution pipeline: defaults, document overrides and merges,
//!   feature fan-out, extension hooks, derivation, and validation
//!   (`resolve`, `Resolver`)
//! - Extension points for deployment add-ons (`SettingsRegistry`)
//! - Log output setup from resolved settings (`logging`)
//!
//! # Resolving settings
//!
//! ```ignore
//! use lyceum_settings::{load_document, resolve, EnvOverlay};
//!
//! fn main() -> Result<(), lyceum_settings::SettingsError> {
//!     let env = EnvOverlay::from_env()?;
//!     let document = load_document(&env)?;
//!     let settings = resolve(&document, &env)?;
//!
//!     lyceum_settings::logging::init_from_settings(&settings.logging, &env.variant);
//!     println!("serving {}", settings.site.site_name);
//!     Ok(())
//! }
//! ```
//!
//! # Extension hooks
//!
//! Deployments with add-ons register them before resolving:
//!
//! ```ignore
//! use lyceum_settings::{Resolver, SettingsRegistry};
//!
//! let mut registry = SettingsRegistry::new();
//! registry.register(MyAddon::new());
//! registry.register_attribute_resolver("campus_directory", resolve_campus_profile);
//!
//! let settings = Resolver::with_registry(&registry).resolve(&document, &env)?;
//! ```
//!
//! Resolution is a pure function of the document and the captured
//! environment overlay: the same inputs always produce equal settings, and
//! nothing is read from the process environment mid-pipeline.

pub mod document;
pub mod env;
pub mod error;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod resolve;
pub mod schema;
mod validation;

// Re-exports
pub use document::Document;
pub use env::{EnvOverlay, MigrationOverrides, ServiceVariant};
pub use error::{SettingsError, SettingsResult};
pub use loader::{DocumentLoader, load_document};
pub use logging::LoggingBuilder;
pub use registry::{AttributeResolver, SettingsExtension, SettingsRegistry, SsoProfile};
pub use resolve::{Resolver, resolve};
pub use schema::{FeatureFlags, Settings};

// Re-export tracing for use by embedding services
pub use tracing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Document, DocumentLoader, EnvOverlay, Resolver, ServiceVariant, Settings, SettingsError,
        SettingsRegistry, SettingsResult, load_document, resolve,
    };
}
