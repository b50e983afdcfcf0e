//! Command surface - thin wrappers over the core engine
//!
//! One module per subcommand. Each command loads the registry, performs its
//! mutations, regenerates artifacts and saves the registry before returning.

pub mod create;
pub mod list;
pub mod remove;
pub mod rename;
pub mod update;
pub mod validate;

use std::fs;

use tracing::debug;

use crate::compose::ComposeAssembler;
use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::ports::PortAllocator;
use crate::registry::Registry;
use crate::settings::SettingsWriter;

/// Run an allocation pass and regenerate every artifact: env files, backend
/// settings, fragments, then the global descriptor.
pub(crate) fn write_all_artifacts(
    config: &SetupConfig,
    registry: &mut Registry,
) -> Result<(), SetupError> {
    PortAllocator::new(config).allocate(registry)?;

    let settings = SettingsWriter::new(config);
    let assembler = ComposeAssembler::new(config);
    for (name, collection) in &mut registry.collections {
        settings.write_env(name, &mut collection.env)?;
        settings.write_backend_settings(name, collection)?;
        assembler.write_fragment(name, collection)?;
    }

    let for_dev = registry.dev_instances() > 0;
    let stats = registry.stats_clients() > 0;
    assembler.write_global(registry, for_dev, stats)
}

/// Best-effort removal of everything created for a collection: its settings
/// directory and its database volume directory.
pub(crate) fn cleanup(config: &SetupConfig, collection: &str) {
    let settings_dir = config.settings_dir(collection);
    if settings_dir.is_dir() {
        debug!(collection, "Removing settings directory");
        let _ = fs::remove_dir_all(settings_dir);
    }
    let pg_dir = config.pg_volume_dir(collection);
    if pg_dir.is_dir() {
        debug!(collection, "Removing database volume directory");
        let _ = fs::remove_dir_all(pg_dir);
    }
}

pub(crate) fn print_restart_hint() {
    println!("Restart the deployment stack:");
    println!("  $ docker-compose down --remove-orphans");
    println!("  $ docker-compose up -d");
}
