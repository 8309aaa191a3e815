//! Show the dependency tree of a template.
//!
//! Without `--root`, every resource nothing depends on is printed as its own tree.
//! Resources inside a cycle that has no such root still get printed, rooted at the
//! smallest remaining id.

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::common::load_template;
use crate::graph::{DependencyGraph, GraphBuilder, detect_cycles};

#[derive(Args, Debug)]
pub struct GraphCommand {
    /// Template file (JSON or YAML)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Only show the tree below this logical id
    #[arg(short, long, value_name = "ID")]
    root: Option<String>,
}

/// Ids to start trees from so that every node appears at least once.
fn tree_roots(graph: &DependencyGraph) -> Vec<&str> {
    let mut roots: Vec<&str> = graph.ids().filter(|id| graph.dependents(id).is_empty()).collect();

    let mut covered: BTreeSet<&str> = BTreeSet::new();
    for &root in &roots {
        covered.insert(root);
        covered.extend(graph.transitive_dependencies(root));
    }
    for id in graph.ids() {
        if !covered.contains(id) {
            roots.push(id);
            covered.insert(id);
            covered.extend(graph.transitive_dependencies(id));
        }
    }
    roots
}

impl GraphCommand {
    pub async fn execute(self) -> Result<()> {
        let template = load_template(&self.file).await?;
        let graph = GraphBuilder::for_template(&template).build()?;

        if let Some(root) = &self.root {
            if !graph.contains(root) {
                bail!("Resource '{}' not found in {}", root, self.file.display());
            }
            print!("{}", graph.render_tree(root));
        } else if graph.is_empty() {
            println!("No resources found.");
        } else {
            for root in tree_roots(&graph) {
                print!("{}", graph.render_tree(root));
            }
        }

        let cycles = detect_cycles(&graph);
        if !cycles.is_empty() {
            println!();
            for cycle in cycles {
                println!("{} {}", "cycle:".yellow(), cycle);
            }
        }
        Ok(())
    }
}
