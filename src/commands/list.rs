//! List collections, human-readable or as JSON.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::registry::Registry;

#[derive(Debug, clap::Args)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(short, long)]
    pub json: bool,
}

/// Full listing: the per-collection views plus the next free port of each
/// class, so an operator can see what the next create will be assigned.
#[derive(Debug, Serialize)]
struct Listing {
    collections: BTreeMap<String, ListedCollection>,
    next_snoop_port: u16,
    next_flower_port: u16,
    next_pg_port: u16,
}

/// Listing view of a collection: env omitted, ports turned into URLs.
#[derive(Debug, Serialize)]
struct ListedCollection {
    image: String,
    autoindex: bool,
    profiling: bool,
    tracing: bool,
    for_dev: bool,
    snoop_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    flower_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pg_port: Option<u16>,
}

pub fn run(config: &SetupConfig, args: &ListArgs) -> Result<(), SetupError> {
    let registry = Registry::load(config)?;
    let listing = prepare(config, &registry);

    if args.json {
        let rendered = serde_json::to_string_pretty(&listing)
            .map_err(|e| SetupError::Document(e.to_string()))?;
        println!("{rendered}");
    } else {
        for (index, (name, collection)) in listing.collections.iter().enumerate() {
            println!("{}. {name}", index + 1);
            println!("  - auto-indexing: {}", collection.autoindex);
            if let Some(flower_url) = &collection.flower_url {
                println!("  - flower URL: {flower_url}");
            }
            println!("  - image: {}", collection.image);
            println!("  - snoop admin URL: {}", collection.snoop_url);
            println!("  - profiling: {}", collection.profiling);
            println!("  - tracing: {}", collection.tracing);
            println!("  - development: {}", collection.for_dev);
        }
    }
    Ok(())
}

fn prepare(config: &SetupConfig, registry: &Registry) -> Listing {
    let collections = registry
        .collections
        .iter()
        .map(|(name, c)| {
            (
                name.clone(),
                ListedCollection {
                    image: c.image.clone(),
                    autoindex: c.autoindex,
                    profiling: c.profiling,
                    tracing: c.tracing,
                    for_dev: c.for_dev,
                    snoop_url: format!("http://localhost:{}", c.snoop_port),
                    flower_url: c
                        .flower_port
                        .filter(|_| c.autoindex)
                        .map(|port| format!("http://localhost:{port}")),
                    pg_port: c.pg_port,
                },
            )
        })
        .collect();

    Listing {
        collections,
        next_snoop_port: registry.next_snoop_port(config.snoop_port_base),
        next_flower_port: registry.next_flower_port(config.flower_port_base),
        next_pg_port: registry.next_pg_port(config.pg_port_base),
    }
}
