//! CLI subcommand implementations.

pub mod check;
pub mod replay;
pub mod resolve;
pub mod watch;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Read a YAML or JSON document. JSON is valid YAML, so one parser covers
/// both.
pub(crate) fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}
