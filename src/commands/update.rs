//! Bulk settings update across a selection of collections.
//!
//! Each paired flag maps onto one reducer application; a flag given without
//! collection names selects all of them.

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::registry::{apply_setting, Registry};

#[derive(Debug, clap::Args)]
pub struct UpdateArgs {
    /// Backend image to use for all collections
    #[arg(short = 's', long)]
    pub image: Option<String>,

    /// Enable development settings for the given collections (all if none given)
    #[arg(short, long, num_args = 0.., value_name = "COLLECTION", conflicts_with = "remove_dev")]
    pub dev: Option<Vec<String>>,

    /// Disable development settings for the given collections (all if none given)
    #[arg(short, long, num_args = 0.., value_name = "COLLECTION")]
    pub remove_dev: Option<Vec<String>>,

    /// Enable profiling for the given collections (all if none given)
    #[arg(short, long, num_args = 0.., value_name = "COLLECTION", conflicts_with = "no_profiling")]
    pub profiling: Option<Vec<String>>,

    /// Disable profiling for the given collections (all if none given)
    #[arg(short, long, num_args = 0.., value_name = "COLLECTION")]
    pub no_profiling: Option<Vec<String>>,

    /// Enable automatic indexing for the given collections (all if none given)
    #[arg(short, long, num_args = 0.., value_name = "COLLECTION", conflicts_with = "manual_indexing")]
    pub autoindex: Option<Vec<String>>,

    /// Disable automatic indexing for the given collections (all if none given)
    #[arg(short, long, num_args = 0.., value_name = "COLLECTION")]
    pub manual_indexing: Option<Vec<String>>,

    /// Enable stats reporting for the given collections (all if none given)
    #[arg(long, num_args = 0.., value_name = "COLLECTION", conflicts_with = "no_stats")]
    pub stats: Option<Vec<String>>,

    /// Disable stats reporting for the given collections (all if none given)
    #[arg(long, num_args = 0.., value_name = "COLLECTION")]
    pub no_stats: Option<Vec<String>>,

    /// Enable tracing for the given collections (all if none given)
    #[arg(short, long, num_args = 0.., value_name = "COLLECTION", conflicts_with = "no_tracing")]
    pub tracing: Option<Vec<String>>,

    /// Disable tracing for the given collections (all if none given)
    #[arg(long, num_args = 0.., value_name = "COLLECTION")]
    pub no_tracing: Option<Vec<String>>,
}

pub fn run(config: &SetupConfig, args: &UpdateArgs) -> Result<(), SetupError> {
    let mut registry = Registry::load(config)?;

    if let Some(image) = &args.image {
        apply_setting(&mut registry, "image", image, Some(&[]))?;
    }
    for (setting, value, selection) in [
        ("for_dev", "on", &args.dev),
        ("for_dev", "off", &args.remove_dev),
        ("profiling", "on", &args.profiling),
        ("profiling", "off", &args.no_profiling),
        ("autoindex", "on", &args.autoindex),
        ("autoindex", "off", &args.manual_indexing),
        ("env.stats", "on", &args.stats),
        ("env.stats", "off", &args.no_stats),
        ("tracing", "on", &args.tracing),
        ("tracing", "off", &args.no_tracing),
    ] {
        apply_setting(&mut registry, setting, value, selection.as_deref())?;
    }

    super::write_all_artifacts(config, &mut registry)?;
    registry.save(config)?;

    super::print_restart_hint();
    Ok(())
}
