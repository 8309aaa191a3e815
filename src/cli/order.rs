//! Print a template's resources in creation or deletion order.
//!
//! ```bash
//! stackgraph order stack.yaml
//! stackgraph order stack.yaml --deletion --json
//! ```

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::common::{load_template, print_json};
use crate::graph::{GraphBuilder, creation_order, deletion_order};

#[derive(Args, Debug)]
pub struct OrderCommand {
    /// Template file (JSON or YAML)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Print deletion order instead of creation order
    #[arg(long)]
    deletion: bool,

    /// Print JSON instead of one id per line
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct OrderOutput<'a> {
    direction: &'a str,
    order: Vec<String>,
}

impl OrderCommand {
    pub async fn execute(self) -> Result<()> {
        let template = load_template(&self.file).await?;
        let graph = GraphBuilder::for_template(&template).build()?;
        let order = if self.deletion {
            deletion_order(&graph)?
        } else {
            creation_order(&graph)?
        };

        if self.json {
            print_json(&OrderOutput {
                direction: if self.deletion { "deletion" } else { "creation" },
                order,
            })
        } else {
            for id in order {
                println!("{id}");
            }
            Ok(())
        }
    }
}
