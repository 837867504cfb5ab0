//! Settings Doctor
//!
//! Resolves a configuration document exactly the way a Lyceum service
//! would at boot, then either prints a short human-readable report or the
//! full resolved settings as JSON. Operators run it against a document
//! before rolling it out; a document the doctor rejects would have aborted
//! the service.
//!
//! # Usage
//!
//! ```bash
//! # Check the document a deployment would discover
//! cargo run --package settings-doctor
//!
//! # Check a specific document as the lms variant
//! cargo run --package settings-doctor -- /etc/lyceum/lyceum.lms.yml --variant lms
//!
//! # Dump every resolved value
//! cargo run --package settings-doctor -- lyceum.yml --json
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lyceum_settings::{
    Document, DocumentLoader, EnvOverlay, LoggingBuilder, ServiceVariant, Settings, resolve,
};
use tracing::warn;

#[derive(Parser)]
#[command(name = "settings-doctor", about = "Checks a Lyceum configuration document")]
struct Args {
    /// Path to the configuration document. Without it the doctor searches
    /// the same locations a service would.
    document: Option<PathBuf>,

    /// Print the full resolved settings as JSON instead of the report.
    #[arg(long)]
    json: bool,

    /// Resolve as this service variant, overriding SERVICE_VARIANT.
    #[arg(long)]
    variant: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    LoggingBuilder::new().level("info").init();

    let mut env = EnvOverlay::from_env().context("reading environment inputs")?;
    if let Some(variant) = args.variant {
        env.variant = ServiceVariant::named(variant);
    }

    let loader = match &args.document {
        Some(path) => DocumentLoader::new().file(path),
        None => DocumentLoader::new()
            .with_current_dir()
            .with_user_config_dir(),
    };
    let document = loader
        .load(&env)
        .context("loading configuration document")?;
    let settings = resolve(&document, &env).context("resolving settings")?;

    for key in document.extra_keys() {
        warn!(key, "document key not modeled by the schema; kept for extensions");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        print_report(&settings, &document);
    }
    Ok(())
}

fn print_report(settings: &Settings, document: &Document) {
    let enabled = settings
        .features
        .iter()
        .filter(|(name, _)| settings.features.enabled(name))
        .count();

    println!("document resolves cleanly");
    println!();
    println!("  variant         {}", settings.service_variant.as_deref().unwrap_or("(none)"));
    println!("  site            {}", settings.site.site_name);
    println!("  platform        {}", settings.site.platform_name);
    println!("  config root     {}", settings.config_root.display());
    println!(
        "  databases       {} ({})",
        settings.database.databases.len(),
        settings
            .database
            .databases
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  caches          {}", settings.database.caches.len());
    // The broker URL embeds credentials; report only the host.
    println!(
        "  broker host     {}",
        if settings.worker.broker.hostname.is_empty() {
            "(unset)"
        } else {
            &settings.worker.broker.hostname
        }
    );
    println!("  default queue   {}", settings.worker.default_queue);
    println!("  queues consumed {}", settings.worker.queues.len());
    println!("  file storage    {}", settings.storage.default_file_storage);
    println!(
        "  features on     {} of {}",
        enabled,
        settings.features.len()
    );
    println!(
        "  logging         {} at {} ({})",
        settings.logging.level,
        settings.logging.dir.display(),
        settings.logging.env_name
    );

    let unmodeled = document.extra_keys().count();
    if unmodeled > 0 {
        println!();
        println!("  note: {unmodeled} document key(s) outside the schema (see warnings)");
    }
}
