//! Validate a template.
//!
//! Checks, in order:
//! 1. The document parses
//! 2. Every reference resolves (all problems reported together)
//! 3. The resources can be ordered (no cycles)
//! 4. With `--catalog`, every property name is known for its resource type
//!
//! ```bash
//! stackgraph validate stack.yaml
//! stackgraph validate stack.yaml --catalog types.json
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::load_template;
use crate::catalog::{StaticCatalog, validate_properties};
use crate::graph::{GraphBuilder, ensure_acyclic};

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Template file (JSON or YAML)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Resource type catalog (JSON, or TOML with a .toml extension)
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,
}

impl ValidateCommand {
    pub async fn execute(self) -> Result<()> {
        let template = load_template(&self.file).await?;
        let graph = GraphBuilder::for_template(&template).build()?;
        ensure_acyclic(&graph)?;

        if let Some(path) = &self.catalog {
            let catalog = StaticCatalog::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?;
            validate_properties(&template.resources, &catalog)?;
        }

        println!(
            "{} {} ({} resource(s), {} dependency edge(s))",
            "✓".green(),
            self.file.display(),
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    }
}
