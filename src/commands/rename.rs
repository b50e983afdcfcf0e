//! Rename a collection: export its index, move every on-disk directory to
//! the new name, rewrite all artifacts and import the index back.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::process;
use crate::registry::{validate_collection_name, Registry};
use crate::validate::Validator;

#[derive(Debug, clap::Args)]
pub struct RenameArgs {
    /// Current collection name
    #[arg(short, long)]
    pub collection: String,

    /// New collection name
    #[arg(short, long)]
    pub new_name: String,
}

pub fn run(config: &SetupConfig, args: &RenameArgs) -> Result<(), SetupError> {
    let mut registry = Registry::load(config)?;
    validate_collection_name(&args.collection, &registry, false)?;
    validate_collection_name(&args.new_name, &registry, true)?;
    Validator::new(config).ensure(&registry)?;

    let old = registry
        .find_name(&args.collection)
        .unwrap_or(&args.collection)
        .to_string();
    let new = args.new_name.clone();

    process::ensure_stack_running(Some(&old))?;
    let archive = archive_name();
    process::export_index(&old, &archive)?;
    process::remove_search_index(&old)?;
    process::ensure_stack_stopped()?;

    rename_paths(config, &old, &new, &archive)?;

    let collection = registry
        .collections
        .remove(&old)
        .ok_or_else(|| SetupError::UnknownCollection(old.clone()))?;
    registry.collections.insert(new.clone(), collection);

    super::write_all_artifacts(config, &mut registry)?;
    registry.save(config)?;
    fs::remove_dir_all(config.settings_dir(&old))?;

    process::ensure_stack_running(Some(&new))?;
    process::import_index(&old.to_lowercase(), &new, &archive)?;
    process::rename_search_collection(&old, &new)?;

    info!(old = %old, new = %new, "Collection renamed");
    Ok(())
}

fn archive_name() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("index-{now}.tar")
}

/// Move the data, volume and blob directories (and the exported index
/// archive) to the new name. All destinations are checked before the first
/// rename so the move either starts cleanly or not at all.
fn rename_paths(
    config: &SetupConfig,
    old: &str,
    new: &str,
    archive: &str,
) -> Result<(), SetupError> {
    let mut pairs: Vec<(PathBuf, PathBuf)> = vec![
        (config.data_dir(old), config.data_dir(new)),
        (config.pg_volume_dir(old), config.pg_volume_dir(new)),
    ];
    if config.blobs_dir(old).is_dir() {
        pairs.push((config.blobs_dir(old), config.blobs_dir(new)));
    }
    let exported = config.exports_dir(old).join(archive);
    if exported.is_file() {
        pairs.push((exported, config.exports_dir(new).join(archive)));
    }

    for (src, dst) in &pairs {
        if !src.exists() {
            return Err(io_err(ErrorKind::NotFound, src));
        }
        if dst.exists() {
            return Err(io_err(ErrorKind::AlreadyExists, dst));
        }
    }
    for (src, dst) in &pairs {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(src, dst)?;
    }
    Ok(())
}

fn io_err(kind: ErrorKind, path: &std::path::Path) -> SetupError {
    SetupError::Io(std::io::Error::new(
        kind,
        format!("{}", path.display()),
    ))
}
