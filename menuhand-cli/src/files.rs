//! Loading configuration and job documents from disk.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Parse `content` as JSON, falling back to YAML.
pub fn parse_document<T: DeserializeOwned>(content: &str) -> Result<T> {
    let json_error = match serde_json::from_str::<T>(content) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    serde_yaml::from_str::<T>(content).map_err(|yaml_error| {
        anyhow!("Content is neither valid JSON ({json_error}) nor valid YAML ({yaml_error})")
    })
}

pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_document(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
