//! Standalone consistency audit over the whole registry.

use crate::config::SetupConfig;
use crate::error::SetupError;
use crate::registry::Registry;
use crate::validate::Validator;

pub fn run(config: &SetupConfig) -> Result<(), SetupError> {
    let registry = Registry::load(config)?;
    let mut findings = Validator::new(config).audit(&registry);

    if findings.is_empty() {
        println!(
            "{} collection(s) checked, no problems found",
            registry.collections.len()
        );
        return Ok(());
    }

    for finding in &findings {
        println!("{finding}");
    }
    Err(findings.remove(0).into())
}
