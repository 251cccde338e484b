//! Loading the broker configuration from disk.

use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::config::BrokerConfig;

/// Load and validate the YAML configuration at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, does not parse, or fails
/// validation.
pub fn load(path: &Path) -> Result<BrokerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let config: BrokerConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
