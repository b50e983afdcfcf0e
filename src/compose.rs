//! Deployment descriptor assembly
//!
//! Each collection gets its own rendered fragment; the global descriptor is
//! a textual concatenation of a version header, the optional shared
//! templates and every fragment in sorted order. The live descriptor is
//! replaced rename-first, keeping exactly one backup generation.

use std::fs;

use tracing::{debug, info};

use crate::config::{
    SetupConfig, COLLECTION_FILE, CUSTOM_SERVICES_FILE, DEV_DOCKER_FILE, DOCKER_FILE, STATS_FILE,
};
use crate::error::SetupError;
use crate::registry::{Collection, Registry};
use crate::template::render;

/// Internal ports of the backing services, fixed by the images in use.
const FLOWER_INTERNAL_PORT: u16 = 5555;
const PG_INTERNAL_PORT: u16 = 5432;

pub struct ComposeAssembler<'a> {
    config: &'a SetupConfig,
}

impl<'a> ComposeAssembler<'a> {
    pub fn new(config: &'a SetupConfig) -> Self {
        Self { config }
    }

    /// Render the per-collection service block into its settings directory.
    pub fn write_fragment(&self, name: &str, collection: &Collection) -> Result<(), SetupError> {
        let template = fs::read_to_string(self.config.template(COLLECTION_FILE))?;

        let dev_volumes = if collection.for_dev {
            "\n      - ../snoop2:/opt/hoover/snoop:cached"
        } else {
            ""
        };
        let dev_ports = match collection.pg_port {
            Some(port) if collection.for_dev => {
                format!("    ports:\n      - \"{port}:{PG_INTERNAL_PORT}\"\n")
            }
            _ => String::new(),
        };
        let profiling_volumes = if collection.profiling {
            format!(
                "\n      - ./profiles/{name}:/opt/hoover/snoop/profiles\
                 \n      - ./settings/urls.py:/opt/hoover/snoop/snoop/urls.py"
            )
        } else {
            String::new()
        };
        let index_command = if collection.autoindex {
            "    command: ./manage.py runworkers\n"
        } else {
            "    command: echo \"disabled\"\n"
        };
        let snoop_stats = if collection.env.stats {
            "\n      - snoop-stats-es"
        } else {
            ""
        };
        let flower_ports = match collection.flower_port {
            Some(port) => format!("    ports:\n      - \"{port}:{FLOWER_INTERNAL_PORT}\"\n"),
            None => String::new(),
        };

        let content = render(
            &template,
            &[
                ("collection_name", name),
                ("snoop_image", &collection.image),
                ("snoop_port", &collection.snoop_port.to_string()),
                ("profiling_volumes", &profiling_volumes),
                ("dev_volumes", dev_volumes),
                ("dev_ports", &dev_ports),
                ("index_command", index_command),
                ("snoop_stats", snoop_stats),
                ("flower_ports", &flower_ports),
            ],
        );

        fs::create_dir_all(self.config.settings_dir(name))?;
        fs::write(self.config.fragment_file(name), content)?;
        debug!(collection = %name, "Wrote deployment fragment");
        Ok(())
    }

    /// Merge all fragments plus the shared templates into the global
    /// descriptor and swap it into place. With an empty registry the live
    /// descriptor is retired to the backup name and nothing is composed.
    pub fn write_global(
        &self,
        registry: &Registry,
        for_dev: bool,
        stats: bool,
    ) -> Result<(), SetupError> {
        let live = self.config.docker_file();
        let backup = self.config.orig_docker_file();

        if registry.is_empty() {
            if live.is_file() {
                info!("Registry is empty, retiring descriptor to {}", backup.display());
                fs::rename(&live, &backup)?;
            }
            return Ok(());
        }

        let mut out = String::from("version: \"3.3\"\n\nservices:\n");

        if stats {
            out.push_str(&fs::read_to_string(self.config.template(STATS_FILE))?);
        }

        let custom_services = self.config.template(CUSTOM_SERVICES_FILE);
        if custom_services.is_file() {
            out.push_str(&fs::read_to_string(custom_services)?);
            out.push('\n');
        }

        let shared = if for_dev { DEV_DOCKER_FILE } else { DOCKER_FILE };
        out.push_str(&fs::read_to_string(self.config.template(shared))?);

        let depends_on = registry
            .collections
            .keys()
            .map(|name| format!("snoop--{name}"))
            .collect::<Vec<_>>()
            .join("\n      - ");
        out.push_str(&format!("    depends_on:\n      - {depends_on}"));

        // the backing network resolves lower-case names only, so mixed-case
        // collections need an explicit alias
        let links: String = registry
            .collections
            .keys()
            .filter(|name| name.as_str() != name.to_lowercase())
            .map(|name| format!("\n      - \"snoop--{name}:snoop--{}\"", name.to_lowercase()))
            .collect();
        if !links.is_empty() {
            out.push_str(&format!("\n    links:{links}\n"));
        }

        for name in registry.collections.keys() {
            out.push('\n');
            out.push_str(&fs::read_to_string(self.config.fragment_file(name))?);
            out.push('\n');
        }

        let fresh = self.config.new_docker_file();
        fs::write(&fresh, out)?;
        self.replace_descriptor()?;
        info!(
            collections = registry.collections.len(),
            "Assembled global descriptor"
        );
        Ok(())
    }

    /// Swap the freshly written descriptor into place. The previous live
    /// descriptor becomes the single retained backup; an older backup is
    /// overwritten without warning.
    fn replace_descriptor(&self) -> Result<(), SetupError> {
        let live = self.config.docker_file();
        if live.is_file() {
            fs::rename(&live, self.config.orig_docker_file())?;
        }
        fs::rename(self.config.new_docker_file(), &live)?;
        Ok(())
    }
}
