//! Helpers shared by the CLI commands.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::registry::TemplateUnit;
use crate::template::{DocumentFormat, Template};

/// Read and parse a template file off the async runtime.
pub async fn load_template(path: &Path) -> Result<Template> {
    let unit = TemplateUnit::new(path);
    tokio::task::spawn_blocking(move || unit.load())
        .await
        .map_err(|e| anyhow::anyhow!("Task join error while loading {}: {}", path.display(), e))?
        .with_context(|| format!("Failed to load template {}", path.display()))
}

/// Raw document bytes and their format, from the extension or the content.
pub async fn read_document(path: &Path) -> Result<(Vec<u8>, DocumentFormat)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    let format = DocumentFormat::detect(path).unwrap_or_else(|| DocumentFormat::sniff(&bytes));
    Ok((bytes, format))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
