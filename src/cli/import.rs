//! Recover dependencies and emission groups from an existing template.
//!
//! Recovery settings come from the configuration file (`[recovery]`).

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{print_json, read_document};
use crate::config::StackgraphConfig;
use crate::import::import_template;

#[derive(Args, Debug)]
pub struct ImportCommand {
    /// Template file (JSON or YAML)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Print the import report as JSON
    #[arg(long)]
    json: bool,

    /// Skip heuristic recovery from Fn::Sub strings
    #[arg(long)]
    no_recovery: bool,
}

impl ImportCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let mut config = StackgraphConfig::load_with_optional(config_path).await?;
        if self.no_recovery {
            config.recovery.enabled = false;
        }

        let (bytes, format) = read_document(&self.file).await?;
        let imported = import_template(&bytes, format, &config.recovery)?;

        if self.json {
            return print_json(&imported.report());
        }

        for (index, group) in imported.groups.iter().enumerate() {
            if group.is_cycle() {
                println!("{:>3}. {} {}", index + 1, "cycle".yellow(), group.members.join(", "));
                for (member, later) in &group.forward_references {
                    let later: Vec<&str> = later.iter().map(String::as_str).collect();
                    println!("       {} -> {} (forward)", member, later.join(", "));
                }
            } else {
                println!("{:>3}. {}", index + 1, group.members.join(", "));
            }
        }

        let recovered = imported.graph.recovered_edges();
        if !recovered.is_empty() {
            println!();
            println!("{}", "Recovered dependencies:".cyan());
            for (from, to) in recovered {
                println!("  {from} -> {to}");
            }
        }

        for warning in &imported.warnings {
            eprintln!("{}: {}", "warning".yellow(), warning);
        }
        Ok(())
    }
}
