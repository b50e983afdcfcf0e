//! collection-setup: registry and deployment-descriptor engine for
//! multi-tenant document collections
//!
//! One invocation loads the persisted registry, performs its mutations,
//! regenerates the per-collection artifacts and the global deployment
//! descriptor, and saves the registry before exit. Invocations must be
//! serialized externally; there is no locking.

mod commands;
mod compose;
mod config;
mod error;
mod ports;
mod process;
mod registry;
mod settings;
mod template;
mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser)]
#[command(name = "collection-setup")]
#[command(about = "Manage collections of a multi-tenant document-processing deployment")]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "collection-setup.toml")]
    config: String,

    /// Deployment root directory (overrides config file)
    #[arg(long, env = "COLLECTION_SETUP_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a collection
    Create(commands::create::CreateArgs),
    /// Remove a collection
    Remove(commands::remove::RemoveArgs),
    /// Rename a collection
    Rename(commands::rename::RenameArgs),
    /// Update settings across collections
    Update(commands::update::UpdateArgs),
    /// List collections
    List(commands::list::ListArgs),
    /// Audit registry/artifact consistency
    Validate,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("collection_setup=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = config::load(std::path::Path::new(&cli.config))?;
    if let Some(root) = cli.root {
        config.root_dir = root;
    }
    debug!(root = %config.root_dir.display(), "Loaded configuration");

    let result = match &cli.command {
        Commands::Create(args) => commands::create::run(&config, args),
        Commands::Remove(args) => commands::remove::run(&config, args),
        Commands::Rename(args) => commands::rename::run(&config, args),
        Commands::Update(args) => commands::update::run(&config, args),
        Commands::List(args) => commands::list::run(&config, args),
        Commands::Validate => commands::validate::run(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    Ok(())
}
