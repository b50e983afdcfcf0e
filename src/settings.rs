//! Per-collection settings artifacts
//!
//! Each collection owns a settings directory holding a line-oriented env
//! file, a backend configuration file rendered from templates, and its
//! deployment fragment (written by the compose assembler). Boolean env flags
//! use an on/off textual encoding.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use tracing::debug;

use crate::config::{
    self, SetupConfig, SETTINGS_DEV_FILE, SETTINGS_FILE, SETTINGS_PROFILING_FILE,
    SETTINGS_TRACING_FILE,
};
use crate::error::SetupError;
use crate::registry::{
    parse_bool, Collection, CollectionEnv, DEFAULT_BASE_URL, ENV_BASE_URL, ENV_DEBUG,
    ENV_SECRET_KEY, ENV_STATS,
};
use crate::template::render;

pub struct SettingsWriter<'a> {
    config: &'a SetupConfig,
}

impl<'a> SettingsWriter<'a> {
    pub fn new(config: &'a SetupConfig) -> Self {
        Self { config }
    }

    /// Write the env artifact, filling defaults for missing recognized keys.
    /// The secret is generated only when absent, so identical input writes an
    /// identical file.
    pub fn write_env(
        &self,
        collection: &str,
        env: &mut CollectionEnv,
    ) -> Result<(), SetupError> {
        if env.secret_key.is_none() {
            env.secret_key = Some(generate_secret());
        }
        if env.base_url.is_none() {
            env.base_url = Some(DEFAULT_BASE_URL.to_string());
        }

        let mut content = String::new();
        content.push_str(&format!(
            "{ENV_SECRET_KEY}={}\n",
            env.secret_key.as_deref().unwrap_or_default()
        ));
        content.push_str(&format!("{ENV_DEBUG}={}\n", onoff(env.debug)));
        content.push_str(&format!(
            "{ENV_BASE_URL}={}\n",
            env.base_url.as_deref().unwrap_or_default()
        ));
        content.push_str(&format!("{ENV_STATS}={}\n", onoff(env.stats)));
        for line in &env.extra {
            content.push_str(line);
            content.push('\n');
        }

        fs::create_dir_all(self.config.settings_dir(collection))?;
        fs::write(self.config.env_file(collection), content)?;
        debug!(collection, "Wrote env file");
        Ok(())
    }

    /// Write the backend configuration artifact: the base template plus the
    /// profiling, dev and tracing fragments, in that order, when the
    /// corresponding flag is set.
    pub fn write_backend_settings(
        &self,
        name: &str,
        collection: &Collection,
    ) -> Result<(), SetupError> {
        let base = fs::read_to_string(self.config.template(SETTINGS_FILE))?;
        let data_dir = format!("{}/{name}", config::COLLECTIONS_DIR);
        let mut content = render(
            &base,
            &[
                ("collection_name", name),
                ("collection_index", &name.to_lowercase()),
                ("collection_root", &data_dir),
            ],
        );

        if collection.profiling {
            content.push_str(&fs::read_to_string(
                self.config.template(SETTINGS_PROFILING_FILE),
            )?);
        }
        if collection.for_dev {
            content.push_str(&fs::read_to_string(
                self.config.template(SETTINGS_DEV_FILE),
            )?);
        }
        if collection.tracing {
            content.push_str(&fs::read_to_string(
                self.config.template(SETTINGS_TRACING_FILE),
            )?);
        }

        fs::create_dir_all(self.config.settings_dir(name))?;
        fs::write(self.config.backend_settings_file(name), content)?;
        debug!(collection = name, "Wrote backend settings");
        Ok(())
    }
}

/// Parse a line-oriented `KEY=value` env file. Recognized keys map onto
/// `CollectionEnv` fields (booleans decoded from their on/off encoding);
/// everything else is kept verbatim in `extra`.
pub fn read_env_file(path: &Path) -> Result<CollectionEnv, SetupError> {
    let content = fs::read_to_string(path)?;
    let mut env = CollectionEnv::default();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match trimmed.split_once('=') {
            Some((ENV_SECRET_KEY, value)) => env.secret_key = Some(value.trim().to_string()),
            Some((ENV_BASE_URL, value)) => env.base_url = Some(value.trim().to_string()),
            Some((ENV_DEBUG, value)) => env.debug = parse_bool(ENV_DEBUG, value.trim())?,
            Some((ENV_STATS, value)) => env.stats = parse_bool(ENV_STATS, value.trim())?,
            _ => env.extra.push(line.to_string()),
        }
    }
    Ok(env)
}

/// Fresh secret key: 100 random bytes, base64-encoded.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 100];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

fn onoff(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch() -> (tempfile::TempDir, SetupConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = SetupConfig::at(dir.path());
        fs::create_dir_all(dir.path().join(config::TEMPLATES_DIR)).unwrap();
        (dir, config)
    }

    #[test]
    fn test_env_round_trip() {
        let (_dir, config) = scratch();
        let writer = SettingsWriter::new(&config);

        let mut env = CollectionEnv {
            secret_key: Some("secret-key===".to_string()),
            debug: true,
            base_url: Some("http://localhost".to_string()),
            stats: false,
            extra: vec!["SOME_OTHER_KEY=opaque".to_string()],
        };
        writer.write_env("testdata", &mut env).unwrap();

        let read_back = read_env_file(&config.env_file("testdata")).unwrap();
        assert_eq!(read_back, env);
    }

    #[test]
    fn test_write_env_fills_defaults() {
        let (_dir, config) = scratch();
        let writer = SettingsWriter::new(&config);

        let mut env = CollectionEnv::default();
        writer.write_env("testdata", &mut env).unwrap();

        let content = fs::read_to_string(config.env_file("testdata")).unwrap();
        assert!(content.contains("DOCKER_HOOVER_SNOOP_DEBUG=off\n"));
        assert!(content.contains("DOCKER_HOOVER_SNOOP_STATS=off\n"));
        assert!(content.contains("DOCKER_HOOVER_SNOOP_BASE_URL=http://localhost\n"));
        // the generated secret is recorded back into the env map
        assert!(env.secret_key.is_some());
    }

    #[test]
    fn test_write_env_is_idempotent() {
        let (_dir, config) = scratch();
        let writer = SettingsWriter::new(&config);

        let mut env = CollectionEnv::default();
        writer.write_env("testdata", &mut env).unwrap();
        let first = fs::read_to_string(config.env_file("testdata")).unwrap();

        writer.write_env("testdata", &mut env).unwrap();
        let second = fs::read_to_string(config.env_file("testdata")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_read_env_accepts_alternate_bool_spellings() {
        let (dir, _config) = scratch();
        let path = dir.path().join("snoop.env");
        fs::write(
            &path,
            "DOCKER_HOOVER_SNOOP_DEBUG=True\nDOCKER_HOOVER_SNOOP_STATS=0\n",
        )
        .unwrap();

        let env = read_env_file(&path).unwrap();
        assert!(env.debug);
        assert!(!env.stats);
    }

    #[test]
    fn test_backend_settings_fragments() {
        let (dir, config) = scratch();
        let templates = dir.path().join(config::TEMPLATES_DIR);
        fs::write(
            templates.join(SETTINGS_FILE),
            "TASK_PREFIX = '{{ collection_name }}'\nINDEX = '{{ collection_index }}'\n",
        )
        .unwrap();
        fs::write(templates.join(SETTINGS_PROFILING_FILE), "PROFILING_ENABLED = True\n").unwrap();
        fs::write(templates.join(SETTINGS_DEV_FILE), "REMOTE_DEBUG_ENABLED = True\n").unwrap();
        fs::write(templates.join(SETTINGS_TRACING_FILE), "TRACING_ENABLED = True\n").unwrap();

        let writer = SettingsWriter::new(&config);
        let mut collection = Collection::new("snoop2");

        writer.write_backend_settings("TestData", &collection).unwrap();
        let content = fs::read_to_string(config.backend_settings_file("TestData")).unwrap();
        assert!(content.contains("TASK_PREFIX = 'TestData'"));
        assert!(content.contains("INDEX = 'testdata'"));
        assert!(!content.contains("PROFILING_ENABLED"));
        assert!(!content.contains("REMOTE_DEBUG_ENABLED"));
        assert!(!content.contains("TRACING_ENABLED"));

        collection.profiling = true;
        collection.for_dev = true;
        collection.tracing = true;
        writer.write_backend_settings("TestData", &collection).unwrap();
        let content = fs::read_to_string(config.backend_settings_file("TestData")).unwrap();
        let profiling = content.find("PROFILING_ENABLED").unwrap();
        let dev = content.find("REMOTE_DEBUG_ENABLED").unwrap();
        let tracing = content.find("TRACING_ENABLED").unwrap();
        // fixed order: profiling, then dev, then tracing
        assert!(profiling < dev && dev < tracing);
    }

    #[test]
    fn test_generated_secrets_differ() {
        assert_ne!(generate_secret(), generate_secret());
    }
}
