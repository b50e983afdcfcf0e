//! Create a collection: allocate its ports, write its artifacts, reassemble
//! the global descriptor.

use std::fs;

use tracing::{info, warn};

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::registry::{validate_collection_name, Collection, Registry};
use crate::template::render;
use crate::validate::Validator;

const STEPS_TEMPLATE: &str = "collection-steps.txt";

#[derive(Debug, clap::Args)]
pub struct CreateArgs {
    /// Collection name; allowed characters: a-z, A-Z, 0-9, _
    #[arg(short, long)]
    pub collection: String,

    /// Backend image for the new collection
    #[arg(short = 's', long)]
    pub image: Option<String>,

    /// Add development settings
    #[arg(short, long)]
    pub dev: bool,

    /// Add profiling settings
    #[arg(short, long)]
    pub profiling: bool,

    /// Add tracing settings
    #[arg(short, long)]
    pub tracing: bool,

    /// Do not start indexing automatically
    #[arg(short, long)]
    pub manual_indexing: bool,
}

pub fn run(config: &SetupConfig, args: &CreateArgs) -> Result<(), SetupError> {
    let mut registry = Registry::load(config)?;

    validate_collection_name(&args.collection, &registry, true)?;
    let validator = Validator::new(config);
    validator.ensure_data_dir(&args.collection)?;
    if !registry.is_empty() {
        validator.ensure(&registry)?;
    }

    let name = args.collection.clone();
    if config.settings_dir(&name).is_dir() {
        return Err(SetupError::InvalidName(format!(
            "{name:?} already has a settings directory"
        )));
    }

    let mut collection = Collection::new(
        args.image
            .clone()
            .unwrap_or_else(|| config.default_image.clone()),
    );
    collection.for_dev = args.dev;
    collection.profiling = args.profiling;
    collection.tracing = args.tracing;
    collection.autoindex = !args.manual_indexing;
    collection.env.debug = args.dev;
    registry.collections.insert(name.clone(), collection);

    if let Err(e) = build(config, &mut registry, &name) {
        warn!(collection = %name, error = %e, "Create failed, rolling back");
        roll_back(config, &mut registry, &name);
        return Err(e);
    }

    info!(collection = %name, "Collection created");
    print_instructions(config, &name);
    Ok(())
}

/// The fallible part of create: everything after the first filesystem
/// mutation, so a failure can be unwound by `roll_back`.
fn build(
    config: &SetupConfig,
    registry: &mut Registry,
    name: &str,
) -> Result<(), SetupError> {
    fs::create_dir_all(config.pg_volume_dir(name))?;
    fs::create_dir_all(config.settings_dir(name))?;
    super::write_all_artifacts(config, registry)?;
    registry.save(config)
}

/// Undo a failed create. The descriptor may already have been swapped to a
/// version referencing the half-created collection, so regenerate it from
/// the registry without the new entry before deleting the entry's
/// directories; the live descriptor must never point at removed settings.
fn roll_back(config: &SetupConfig, registry: &mut Registry, name: &str) {
    registry.collections.remove(name);
    if let Err(e) = super::write_all_artifacts(config, registry) {
        warn!(error = %e, "Could not regenerate the descriptor during rollback");
    }
    super::cleanup(config, name);
}

fn print_instructions(config: &SetupConfig, name: &str) {
    let template_path = config.template(STEPS_TEMPLATE);
    let Ok(template) = fs::read_to_string(&template_path) else {
        info!("No instructions template, skipping steps file");
        return;
    };
    let steps = render(
        &template,
        &[
            ("collection_name", name),
            ("collection_index", &name.to_lowercase()),
        ],
    );
    let steps_file = config.instructions_file(name);
    if fs::write(&steps_file, &steps).is_ok() {
        println!("{steps}");
        println!("The steps above are described in {}", steps_file.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn args(name: &str) -> CreateArgs {
        CreateArgs {
            collection: name.to_string(),
            image: None,
            dev: false,
            profiling: false,
            tracing: false,
            manual_indexing: false,
        }
    }

    fn scratch() -> (tempfile::TempDir, SetupConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = SetupConfig::at(dir.path());
        let templates = dir.path().join(config::TEMPLATES_DIR);
        fs::create_dir_all(&templates).unwrap();
        fs::write(
            templates.join(config::COLLECTION_FILE),
            "  snoop--{{ collection_name }}:\n    image: {{ snoop_image }}\n\
             \x20   ports:\n      - \"{{ snoop_port }}:80\"\n",
        )
        .unwrap();
        fs::write(
            templates.join(config::DOCKER_FILE),
            "  search:\n    image: search\n",
        )
        .unwrap();
        fs::write(
            templates.join(config::SETTINGS_FILE),
            "TASK_PREFIX = '{{ collection_name }}'\n",
        )
        .unwrap();
        // a directory squatting on the registry document makes the final
        // save fail, after the descriptor has already been swapped in
        fs::create_dir_all(config.registry_file()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_failed_create_rolls_back_artifacts() {
        let (_dir, config) = scratch();
        fs::create_dir_all(config.data_dir("testdata")).unwrap();

        assert!(run(&config, &args("testdata")).is_err());

        assert!(!config.settings_dir("testdata").exists());
        assert!(!config.pg_volume_dir("testdata").exists());
        // the registry was empty before, so no live descriptor survives
        assert!(!config.docker_file().exists());
    }

    #[test]
    fn test_failed_create_restores_descriptor() {
        let (_dir, config) = scratch();
        fs::create_dir_all(config.data_dir("base")).unwrap();
        fs::create_dir_all(config.data_dir("extra")).unwrap();

        // pre-existing deployment, reconstructed from its descriptor
        fs::write(
            config.docker_file(),
            "version: \"3.3\"\n\nservices:\n  snoop--base:\n    image: snoop2\n\
             \x20   ports:\n      - \"45025:80\"\n",
        )
        .unwrap();
        fs::create_dir_all(config.settings_dir("base")).unwrap();
        fs::write(config.fragment_file("base"), "").unwrap();
        fs::write(config.backend_settings_file("base"), "").unwrap();
        fs::write(config.env_file("base"), "").unwrap();

        assert!(run(&config, &args("extra")).is_err());

        // the live descriptor no longer references the removed settings
        let content = fs::read_to_string(config.docker_file()).unwrap();
        assert!(content.contains("snoop--base"));
        assert!(!content.contains("snoop--extra"));
        assert!(!config.settings_dir("extra").exists());
        assert!(!config.pg_volume_dir("extra").exists());
        assert!(config.settings_dir("base").is_dir());
    }
}
