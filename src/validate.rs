//! Consistency audit
//!
//! Checks that every registry entry still has the artifacts the other
//! components require: its data directory, settings directory, deployment
//! fragment, backend settings file and env file.

use std::fmt;
use std::path::PathBuf;

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::registry::Registry;

#[derive(Debug)]
pub struct Finding {
    pub collection: String,
    pub what: &'static str,
    pub path: PathBuf,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "collection {} has no {} ({})",
            self.collection,
            self.what,
            self.path.display()
        )
    }
}

impl From<Finding> for SetupError {
    fn from(finding: Finding) -> Self {
        SetupError::MissingArtifact {
            collection: finding.collection,
            what: finding.what,
            path: finding.path,
        }
    }
}

pub struct Validator<'a> {
    config: &'a SetupConfig,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a SetupConfig) -> Self {
        Self { config }
    }

    /// Collect every missing artifact across the registry.
    pub fn audit(&self, registry: &Registry) -> Vec<Finding> {
        let mut findings = Vec::new();
        for name in registry.collections.keys() {
            let checks: [(&'static str, PathBuf, bool); 5] = [
                ("data directory", self.config.data_dir(name), true),
                ("settings directory", self.config.settings_dir(name), true),
                ("deployment fragment", self.config.fragment_file(name), false),
                (
                    "backend settings file",
                    self.config.backend_settings_file(name),
                    false,
                ),
                ("env file", self.config.env_file(name), false),
            ];
            for (what, path, is_dir) in checks {
                let present = if is_dir { path.is_dir() } else { path.is_file() };
                if !present {
                    findings.push(Finding {
                        collection: name.clone(),
                        what,
                        path,
                    });
                }
            }
        }
        findings
    }

    /// Fail on the first missing artifact.
    pub fn ensure(&self, registry: &Registry) -> Result<(), SetupError> {
        match self.audit(registry).into_iter().next() {
            Some(finding) => Err(finding.into()),
            None => Ok(()),
        }
    }

    /// Check that a collection's source data directory exists. Used before
    /// create, ahead of any filesystem mutation.
    pub fn ensure_data_dir(&self, collection: &str) -> Result<(), SetupError> {
        let data_dir = self.config.data_dir(collection);
        if !data_dir.is_dir() {
            return Err(SetupError::MissingArtifact {
                collection: collection.to_string(),
                what: "data directory",
                path: data_dir,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Collection;
    use std::fs;

    #[test]
    fn test_audit_reports_each_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = SetupConfig::at(dir.path());

        let mut registry = Registry::default();
        registry
            .collections
            .insert("testdata".to_string(), Collection::new("snoop2"));

        let findings = Validator::new(&config).audit(&registry);
        assert_eq!(findings.len(), 5);
        assert!(Validator::new(&config).ensure(&registry).is_err());
    }

    #[test]
    fn test_audit_passes_with_all_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = SetupConfig::at(dir.path());

        let mut registry = Registry::default();
        registry
            .collections
            .insert("testdata".to_string(), Collection::new("snoop2"));

        fs::create_dir_all(config.data_dir("testdata")).unwrap();
        fs::create_dir_all(config.settings_dir("testdata")).unwrap();
        fs::write(config.fragment_file("testdata"), "").unwrap();
        fs::write(config.backend_settings_file("testdata"), "").unwrap();
        fs::write(config.env_file("testdata"), "").unwrap();

        assert!(Validator::new(&config).audit(&registry).is_empty());
        assert!(Validator::new(&config).ensure(&registry).is_ok());
    }
}
