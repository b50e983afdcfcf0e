//! Setup configuration
//!
//! Every directory name, artifact file name and port base lives here and is
//! threaded through the component constructors, so tests can run against a
//! scratch directory without touching shared process state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Persisted registry document.
pub const REGISTRY_FILE: &str = "collections.json";

/// Live deployment descriptor and its one retained backup generation.
pub const DOCKER_FILE: &str = "docker-compose.override.yml";
pub const ORIG_DOCKER_FILE: &str = "docker-compose.override-orig.yml";
pub const NEW_DOCKER_FILE: &str = "docker-compose.override-new.yml";

/// Shared templates merged into the global descriptor.
pub const DEV_DOCKER_FILE: &str = "docker-compose.override-dev.yml";
pub const STATS_FILE: &str = "snoop-stats.yml";
pub const CUSTOM_SERVICES_FILE: &str = "docker-custom-services.yml";

/// Per-collection artifact file names.
pub const COLLECTION_FILE: &str = "docker-collection.yml";
pub const SETTINGS_FILE: &str = "snoop-settings.py";
pub const SETTINGS_PROFILING_FILE: &str = "snoop-settings-profiling.py";
pub const SETTINGS_DEV_FILE: &str = "snoop-settings-dev.py";
pub const SETTINGS_TRACING_FILE: &str = "snoop-settings-tracing.py";
pub const ENV_FILE: &str = "snoop.env";

pub const COLLECTIONS_DIR: &str = "collections";
pub const SETTINGS_DIR: &str = "settings";
pub const TEMPLATES_DIR: &str = "templates";
pub const VOLUMES_DIR: &str = "volumes";
pub const BLOBS_DIR: &str = "snoop-blobs";

pub const ALLOWED_NAME_CHARS: &str = "a-z, A-Z, 0-9, _";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Deployment root; all other paths are relative to it
    #[serde(default = "default_root")]
    pub root_dir: PathBuf,

    /// Image used when `create` is not given one explicitly
    #[serde(default = "default_image")]
    pub default_image: String,

    /// First externally exposed backend admin port
    #[serde(default = "default_snoop_port_base")]
    pub snoop_port_base: u16,

    /// First externally exposed worker monitoring port
    #[serde(default = "default_flower_port_base")]
    pub flower_port_base: u16,

    /// Internal database port; exposed dev ports start one above it
    #[serde(default = "default_pg_port_base")]
    pub pg_port_base: u16,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_image() -> String {
    "liquidinvestigations/hoover-snoop2".to_string()
}
fn default_snoop_port_base() -> u16 {
    45025
}
fn default_flower_port_base() -> u16 {
    15555
}
fn default_pg_port_base() -> u16 {
    5432
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root(),
            default_image: default_image(),
            snoop_port_base: default_snoop_port_base(),
            flower_port_base: default_flower_port_base(),
            pg_port_base: default_pg_port_base(),
        }
    }
}

impl SetupConfig {
    /// Default configuration rooted at a scratch directory.
    #[cfg(test)]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root.into(),
            ..Self::default()
        }
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root_dir.join(REGISTRY_FILE)
    }

    pub fn docker_file(&self) -> PathBuf {
        self.root_dir.join(DOCKER_FILE)
    }

    pub fn orig_docker_file(&self) -> PathBuf {
        self.root_dir.join(ORIG_DOCKER_FILE)
    }

    pub fn new_docker_file(&self) -> PathBuf {
        self.root_dir.join(NEW_DOCKER_FILE)
    }

    pub fn template(&self, name: &str) -> PathBuf {
        self.root_dir.join(TEMPLATES_DIR).join(name)
    }

    pub fn settings_dir(&self, collection: &str) -> PathBuf {
        self.root_dir.join(SETTINGS_DIR).join(collection)
    }

    pub fn fragment_file(&self, collection: &str) -> PathBuf {
        self.settings_dir(collection).join(COLLECTION_FILE)
    }

    pub fn env_file(&self, collection: &str) -> PathBuf {
        self.settings_dir(collection).join(ENV_FILE)
    }

    pub fn backend_settings_file(&self, collection: &str) -> PathBuf {
        self.settings_dir(collection).join(SETTINGS_FILE)
    }

    /// Source data directory for a collection, bind-mounted into its services.
    pub fn data_dir(&self, collection: &str) -> PathBuf {
        self.root_dir.join(COLLECTIONS_DIR).join(collection)
    }

    pub fn pg_volume_dir(&self, collection: &str) -> PathBuf {
        self.root_dir
            .join(VOLUMES_DIR)
            .join(format!("snoop-pg--{collection}"))
    }

    pub fn blobs_dir(&self, collection: &str) -> PathBuf {
        self.root_dir.join(BLOBS_DIR).join(collection)
    }

    pub fn exports_dir(&self, collection: &str) -> PathBuf {
        self.root_dir.join(VOLUMES_DIR).join("exports").join(collection)
    }

    pub fn instructions_file(&self, collection: &str) -> PathBuf {
        self.root_dir.join(format!("collection-{collection}-steps.txt"))
    }
}

/// Load the optional TOML config next to the deployment, falling back to
/// defaults when the file is absent.
pub fn load(path: &Path) -> anyhow::Result<SetupConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    } else {
        Ok(SetupConfig::default())
    }
}
