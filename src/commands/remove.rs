//! Remove a collection: drop its search index, its registry entry and its
//! on-disk artifacts, then reassemble the global descriptor.

use std::fs;
use std::io::{self, BufRead, Write};

use tracing::{info, warn};

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::process;
use crate::registry::{validate_collection_name, Registry};
use crate::validate::Validator;

#[derive(Debug, clap::Args)]
pub struct RemoveArgs {
    /// Collection name
    #[arg(short, long)]
    pub collection: String,

    /// Skip the index removal from search
    #[arg(long)]
    pub skip_index: bool,

    /// Remove the collection's blob store too
    #[arg(short = 'b', long)]
    pub remove_blobs: bool,

    /// Answer yes to all interactive prompts
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub fn run(config: &SetupConfig, args: &RemoveArgs) -> Result<(), SetupError> {
    let mut registry = Registry::load(config)?;
    validate_collection_name(&args.collection, &registry, false)?;
    let name = registry
        .find_name(&args.collection)
        .unwrap_or(&args.collection)
        .to_string();

    // report missing artifacts but do not block removal on them
    for finding in Validator::new(config).audit(&registry) {
        warn!("{finding}");
    }

    if !args.skip_index {
        // a failed index removal blocks proceeding with deletion;
        // --skip-index removes the settings without touching the index
        process::remove_index(&name)?;
    }

    registry.collections.remove(&name);
    super::write_all_artifacts(config, &mut registry)?;
    registry.save(config)?;

    super::cleanup(config, &name);
    if args.remove_blobs {
        remove_blobs(config, &name, args.yes)?;
    }

    info!(collection = %name, "Collection removed");
    super::print_restart_hint();
    Ok(())
}

fn remove_blobs(config: &SetupConfig, collection: &str, force_yes: bool) -> Result<(), SetupError> {
    let blobs_dir = config.blobs_dir(collection);
    if !blobs_dir.is_dir() {
        return Ok(());
    }
    if !force_yes && !confirm("Please confirm the deletion of blobs (yes/no): ")? {
        return Ok(());
    }
    info!(collection, "Removing blob store");
    fs::remove_dir_all(blobs_dir)?;
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool, SetupError> {
    let stdin = io::stdin();
    loop {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        match answer.trim().to_ascii_lowercase().as_str() {
            "yes" => return Ok(true),
            "no" => return Ok(false),
            other => println!("Invalid option {other:?}"),
        }
    }
}
