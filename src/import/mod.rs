//! Template import pipeline
//!
//! Importing an existing template means recovering as much dependency information as
//! possible and producing an order that code generators can emit, even when the
//! template contains cycles:
//!
//! 1. Parse the document into a [`Template`]
//! 2. Build the [`DependencyGraph`] with heuristic recovery enabled (per
//!    [`RecoveryConfig`])
//! 3. Order it with [`emission_order`], which groups each cycle and marks the
//!    references that must be written as forward references
//!
//! Ambiguous recoveries are carried as warnings on the result and never fail the import.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::config::RecoveryConfig;
use crate::core::Result;
use crate::graph::{AmbiguousRecovery, DependencyGraph, EmissionGroup, GraphBuilder, emission_order};
use crate::refs::LogicalId;
use crate::template::{DocumentFormat, Template};

/// A parsed template with its recovered graph and emission order.
#[derive(Debug, Clone)]
pub struct ImportedTemplate {
    pub template: Template,
    pub graph: DependencyGraph,
    pub groups: Vec<EmissionGroup>,
    pub warnings: Vec<AmbiguousRecovery>,
}

impl ImportedTemplate {
    /// Logical ids in emission order, flattened across groups.
    pub fn emission_sequence(&self) -> Vec<&str> {
        self.groups.iter().flat_map(|g| g.members.iter().map(String::as_str)).collect()
    }

    /// Groups holding more than one resource.
    pub fn cycles(&self) -> impl Iterator<Item = &EmissionGroup> {
        self.groups.iter().filter(|g| g.is_cycle())
    }

    pub fn report(&self) -> ImportReport {
        ImportReport {
            resources: self.graph.node_count(),
            groups: self
                .groups
                .iter()
                .map(|group| GroupReport {
                    members: group.members.clone(),
                    forward_references: group.forward_references.clone(),
                })
                .collect(),
            recovered: self
                .graph
                .recovered_edges()
                .into_iter()
                .map(|(from, to)| RecoveredReport {
                    from: from.to_string(),
                    to: to.to_string(),
                })
                .collect(),
            warnings: self.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Serializable summary of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub resources: usize,
    pub groups: Vec<GroupReport>,
    pub recovered: Vec<RecoveredReport>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub members: Vec<LogicalId>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub forward_references: BTreeMap<LogicalId, BTreeSet<LogicalId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveredReport {
    pub from: LogicalId,
    pub to: LogicalId,
}

/// Parse `bytes` and compute the recovered graph and emission groups.
///
/// # Errors
///
/// Parse errors, unresolved references and self references. Cycles are not errors.
pub fn import_template(
    bytes: &[u8],
    format: DocumentFormat,
    config: &RecoveryConfig,
) -> Result<ImportedTemplate> {
    let template = Template::parse(bytes, format)?;
    let graph = GraphBuilder::for_template(&template).with_recovery(config).build()?;
    let groups = emission_order(&graph);
    let warnings = graph.warnings().to_vec();

    let recovered = graph.recovered_edges().len();
    if recovered > 0 {
        debug!("Recovered {} dependency edge(s) from Fn::Sub strings", recovered);
    }
    info!(
        "Imported {} resource(s) in {} group(s), {} warning(s)",
        graph.node_count(),
        groups.len(),
        warnings.len()
    );

    Ok(ImportedTemplate {
        template,
        graph,
        groups,
        warnings,
    })
}
