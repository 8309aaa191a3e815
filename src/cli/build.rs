//! Merge several templates into one ordered document.
//!
//! Every file is loaded into a [`Registry`] concurrently. A logical id may be declared
//! as a resource in only one file. Parameters, conditions, mappings and outputs are
//! merged in file order, later files replacing earlier entries. The merged resource
//! set is then ordered and written as a single document.
//!
//! ```bash
//! stackgraph build network.yaml compute.yaml --output stack.json
//! stackgraph build *.yaml --yaml
//! ```

use anyhow::{Context, Result, bail};
use clap::Args;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::registry::{LoadedUnit, Registry, TemplateUnit, load_units};
use crate::template::{DocumentFormat, Template};

#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Template files (JSON or YAML)
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Write the document here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Emit YAML instead of JSON
    #[arg(long)]
    yaml: bool,
}

fn merge_section<V>(target: &mut BTreeMap<String, V>, source: BTreeMap<String, V>, section: &str, unit: &str) {
    for (key, value) in source {
        if target.insert(key.clone(), value).is_some() {
            warn!("{} in {} replaces an earlier declaration of {}", section, unit, key);
        }
    }
}

/// Resource names registered by more than one unit, with the units that declared them.
fn duplicate_declarations(units: &[LoadedUnit]) -> BTreeMap<&str, Vec<&str>> {
    let mut declared: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for unit in units {
        for name in &unit.registered {
            declared.entry(name.as_str()).or_default().insert(unit.name.as_str());
        }
    }
    declared
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(name, files)| (name, files.into_iter().collect()))
        .collect()
}

/// Combine the non-resource sections of every unit, in unit order.
fn merge_contexts(units: Vec<LoadedUnit>) -> Template {
    let mut merged = Template::new();
    for unit in units {
        let LoadedUnit {
            name,
            context,
            ..
        } = unit;
        if merged.description.is_none() {
            merged.description = context.description;
        }
        merge_section(&mut merged.parameters, context.parameters, "Parameter", &name);
        merge_section(&mut merged.mappings, context.mappings, "Mapping", &name);
        merge_section(&mut merged.conditions, context.conditions, "Condition", &name);
        merge_section(&mut merged.outputs, context.outputs, "Output", &name);
    }
    merged
}

impl BuildCommand {
    pub async fn execute(self) -> Result<()> {
        let registry = Arc::new(Registry::new());
        let units: Vec<TemplateUnit> = self.files.iter().map(TemplateUnit::new).collect();
        let loaded = load_units(Arc::clone(&registry), units).await.context("Failed to load templates")?;

        let duplicates = duplicate_declarations(&loaded);
        if !duplicates.is_empty() {
            let lines: Vec<String> = duplicates
                .iter()
                .map(|(name, files)| format!("  - {} ({})", name, files.join(", ")))
                .collect();
            bail!("Resources declared in more than one file:\n{}", lines.join("\n"));
        }

        let mut template = merge_contexts(loaded);
        template.resources = registry.snapshot()?;
        info!("Merged {} resource(s) from {} file(s)", template.resources.len(), self.files.len());

        let document = template.to_document()?;
        let format = if self.yaml {
            DocumentFormat::Yaml
        } else {
            DocumentFormat::Json
        };
        let bytes = document.to_bytes(format)?;

        match &self.output {
            Some(path) => tokio::fs::write(path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?,
            None => println!("{}", String::from_utf8_lossy(&bytes).trim_end()),
        }
        Ok(())
    }
}
