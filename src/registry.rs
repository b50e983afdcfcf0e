//! Collection registry - persisted state and derived counters
//!
//! The registry is the collection-name keyed document the whole engine works
//! from: loaded at the start of every invocation, mutated in memory, saved
//! before exit. Roll-up counters (next free ports, dev instance count, stats
//! client count) are always computed from the map, never stored.

use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::settings;

/// Recognized environment file keys. Anything else is passed through opaquely.
pub const ENV_SECRET_KEY: &str = "DOCKER_HOOVER_SNOOP_SECRET_KEY";
pub const ENV_DEBUG: &str = "DOCKER_HOOVER_SNOOP_DEBUG";
pub const ENV_BASE_URL: &str = "DOCKER_HOOVER_SNOOP_BASE_URL";
pub const ENV_STATS: &str = "DOCKER_HOOVER_SNOOP_STATS";

pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// The fixed set of secrets and flags carried in a collection's env file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEnv {
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub stats: bool,
    /// Unrecognized env file lines, re-emitted verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

/// One tenant instance of the document-processing backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub image: String,
    #[serde(default)]
    pub autoindex: bool,
    #[serde(default)]
    pub profiling: bool,
    #[serde(default)]
    pub tracing: bool,
    #[serde(default)]
    pub for_dev: bool,
    /// Externally exposed backend admin port; 0 until the first allocation pass
    #[serde(default)]
    pub snoop_port: u16,
    /// Worker monitoring UI port, present iff `autoindex`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flower_port: Option<u16>,
    /// Exposed database port, present iff `for_dev`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_port: Option<u16>,
    #[serde(default)]
    pub env: CollectionEnv,
}

impl Collection {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            autoindex: true,
            profiling: false,
            tracing: false,
            for_dev: false,
            snoop_port: 0,
            flower_port: None,
            pg_port: None,
            env: CollectionEnv::default(),
        }
    }
}

/// Ordered map of collections keyed by name. `BTreeMap` gives the
/// lexicographic iteration order every deterministic output relies on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    pub collections: BTreeMap<String, Collection>,
}

impl Registry {
    /// Load the persisted registry document. Falls back to reconstructing
    /// state from an older-format deployment descriptor when the document is
    /// absent, and to an empty registry when that is absent too.
    pub fn load(config: &SetupConfig) -> Result<Self, SetupError> {
        let registry_file = config.registry_file();
        if registry_file.is_file() {
            let content = fs::read_to_string(&registry_file)?;
            let registry: Registry = serde_json::from_str(&content)
                .map_err(|e| SetupError::Document(format!("{}: {e}", registry_file.display())))?;
            debug!(collections = registry.collections.len(), "Loaded registry document");
            return Ok(registry);
        }

        if config.docker_file().is_file() {
            info!("Registry document absent, reconstructing from deployment descriptor");
            return Self::load_legacy(config);
        }

        debug!("No registry document or descriptor, starting empty");
        Ok(Self::default())
    }

    /// Reconstruct registry state by scanning per-collection service blocks in
    /// an existing descriptor, inferring flags from the bind-mounts present.
    fn load_legacy(config: &SetupConfig) -> Result<Self, SetupError> {
        let docker_file = config.docker_file();
        let content = fs::read_to_string(&docker_file)?;
        let doc: serde_yaml::Value = serde_yaml::from_str(&content)
            .map_err(|e| SetupError::Document(format!("{}: {e}", docker_file.display())))?;

        let services = doc
            .get("services")
            .and_then(|v| v.as_mapping())
            .ok_or_else(|| {
                SetupError::Document(format!("{}: no services key", docker_file.display()))
            })?;

        let mut registry = Registry::default();
        for (key, service) in services {
            let Some(service_name) = key.as_str() else {
                continue;
            };

            if let Some(name) = service_name.strip_prefix("snoop-worker--") {
                let entry = registry
                    .collections
                    .entry(name.to_string())
                    .or_insert_with(|| Collection::new(""));
                entry.autoindex = service
                    .get("command")
                    .and_then(|v| v.as_str())
                    .is_some_and(|cmd| cmd.contains("./manage.py runworkers"));
                entry.flower_port = first_exposed_port(service);
            } else if let Some(name) = service_name.strip_prefix("snoop--") {
                let entry = registry
                    .collections
                    .entry(name.to_string())
                    .or_insert_with(|| Collection::new(""));
                if let Some(image) = service.get("image").and_then(|v| v.as_str()) {
                    entry.image = image.to_string();
                }
                entry.profiling = has_volume(service, &format!("./profiles/{name}"))
                    && has_volume(service, "./settings/urls.py");
                entry.for_dev = has_volume(service, "../snoop2");
                entry.snoop_port = first_exposed_port(service).unwrap_or(0);
            }
        }

        for (name, collection) in &mut registry.collections {
            if !collection.autoindex {
                collection.flower_port = None;
            }
            // pg ports are not recoverable from the descriptor; the next
            // allocation pass reassigns them for dev collections
            collection.pg_port = None;

            let env_file = config.env_file(name);
            if env_file.is_file() {
                collection.env = settings::read_env_file(&env_file)?;
            } else {
                warn!(collection = %name, "No env file found during reconstruction");
            }
        }

        info!(
            collections = registry.collections.len(),
            "Reconstructed registry from descriptor"
        );
        Ok(registry)
    }

    /// Serialize back to the registry document. Key ordering and formatting
    /// are stable, so saving unchanged state is byte-identical.
    pub fn save(&self, config: &SetupConfig) -> Result<(), SetupError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SetupError::Document(e.to_string()))?;
        fs::write(config.registry_file(), content + "\n")?;
        debug!(collections = self.collections.len(), "Saved registry document");
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Find the stored name matching `name` case-insensitively.
    pub fn find_name(&self, name: &str) -> Option<&str> {
        self.collections
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn next_snoop_port(&self, base: u16) -> u16 {
        self.collections
            .values()
            .map(|c| c.snoop_port)
            .filter(|p| *p != 0)
            .max()
            .map(|p| p + 1)
            .unwrap_or(base)
    }

    pub fn next_flower_port(&self, base: u16) -> u16 {
        self.collections
            .values()
            .filter_map(|c| c.flower_port)
            .max()
            .map(|p| p + 1)
            .unwrap_or(base)
    }

    /// Next database port to expose. The counter advances only for
    /// dev-enabled collections.
    pub fn next_pg_port(&self, base: u16) -> u16 {
        base + 1 + self.dev_instances() as u16
    }

    pub fn dev_instances(&self) -> usize {
        self.collections.values().filter(|c| c.for_dev).count()
    }

    pub fn stats_clients(&self) -> usize {
        self.collections.values().filter(|c| c.env.stats).count()
    }
}

/// Validate a collection name against the naming rule and, depending on
/// `new`, against the registry: a new name must not collide (case
/// insensitively) with an existing entry, an old name must exist.
pub fn validate_collection_name(
    name: &str,
    registry: &Registry,
    new: bool,
) -> Result<(), SetupError> {
    if name.is_empty() {
        return Err(SetupError::InvalidName(
            "collection name must not be empty".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SetupError::InvalidName(format!(
            "{name:?}; allowed characters: {}",
            crate::config::ALLOWED_NAME_CHARS
        )));
    }
    if !name.chars().next().unwrap_or('_').is_ascii_alphabetic() {
        return Err(SetupError::InvalidName(format!(
            "{name:?}; the first character must be a letter"
        )));
    }

    let existing = registry.find_name(name);
    if new {
        if let Some(existing) = existing {
            return Err(SetupError::InvalidName(format!(
                "{name:?} collides with existing collection {existing}"
            )));
        }
    } else if existing.is_none() {
        return Err(SetupError::UnknownCollection(name.to_string()));
    }
    Ok(())
}

/// Whether `name` falls in a selection: `None` selects nothing, an empty list
/// selects everything, otherwise membership is case-insensitive.
pub fn selected(name: &str, selection: Option<&[String]>) -> bool {
    match selection {
        None => false,
        Some([]) => true,
        Some(names) => names.iter().any(|n| n.eq_ignore_ascii_case(name)),
    }
}

pub(crate) fn parse_bool(setting: &str, value: &str) -> Result<bool, SetupError> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "y" | "t" | "1" => Ok(true),
        "off" | "false" | "no" | "n" | "f" | "0" => Ok(false),
        _ => Err(SetupError::InvalidValue {
            setting: setting.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Bulk settings reducer: apply one dotted attribute path to every selected
/// collection. All flag/derived-field couplings live here and nowhere else,
/// so `flower_port` can never survive `autoindex = false` and `pg_port` can
/// never survive `for_dev = false`, whichever command performed the update.
pub fn apply_setting(
    registry: &mut Registry,
    setting: &str,
    value: &str,
    selection: Option<&[String]>,
) -> Result<(), SetupError> {
    if selection.is_none() {
        return Ok(());
    }

    for (name, collection) in &mut registry.collections {
        if !selected(name, selection) {
            continue;
        }
        debug!(collection = %name, setting, value, "Applying setting");
        match setting {
            "image" => collection.image = value.to_string(),
            "profiling" => collection.profiling = parse_bool(setting, value)?,
            "tracing" => collection.tracing = parse_bool(setting, value)?,
            "autoindex" => {
                let enable = parse_bool(setting, value)?;
                if collection.autoindex != enable {
                    collection.autoindex = enable;
                    // cleared on disable; a fresh port is assigned on the
                    // next allocation pass when re-enabled
                    collection.flower_port = None;
                }
            }
            "for_dev" => {
                let enable = parse_bool(setting, value)?;
                if collection.for_dev != enable {
                    collection.for_dev = enable;
                    collection.pg_port = None;
                    collection.env.debug = enable;
                }
            }
            "env.debug" => collection.env.debug = parse_bool(setting, value)?,
            "env.stats" => collection.env.stats = parse_bool(setting, value)?,
            "env.base_url" => collection.env.base_url = Some(value.to_string()),
            _ => return Err(SetupError::UnknownSetting(setting.to_string())),
        }
    }
    Ok(())
}

fn first_exposed_port(service: &serde_yaml::Value) -> Option<u16> {
    let mapping = service
        .get("ports")?
        .as_sequence()?
        .first()?
        .as_str()?
        .to_string();
    mapping.split(':').next()?.parse().ok()
}

fn has_volume(service: &serde_yaml::Value, local: &str) -> bool {
    service
        .get("volumes")
        .and_then(|v| v.as_sequence())
        .map(|volumes| {
            volumes
                .iter()
                .filter_map(|v| v.as_str())
                .any(|v| v.split(':').next() == Some(local))
        })
        .unwrap_or(false)
}
