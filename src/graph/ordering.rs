//! Creation, deletion and emission ordering.
//!
//! All three orders are deterministic: among nodes that could go next, the smallest
//! logical id wins. `creation_order` and `deletion_order` require an acyclic graph;
//! `emission_order` tolerates cycles by grouping each strongly connected component.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use tracing::debug;

use super::builder::{DependencyGraph, GraphBuilder};
use super::scc::{ensure_acyclic, find_sccs};
use crate::core::Result;
use crate::refs::LogicalId;
use crate::template::{Resource, ResourceSet};

/// Logical ids with dependencies before dependents.
///
/// Kahn's algorithm with a min-heap of ready ids, so independent resources come out in
/// logical-id order.
///
/// # Errors
///
/// [`StackError::CircularDependency`](crate::core::StackError::CircularDependency) naming
/// every member of every cycle.
pub fn creation_order(graph: &DependencyGraph) -> Result<Vec<LogicalId>> {
    ensure_acyclic(graph)?;

    let mut remaining: BTreeMap<&str, usize> =
        graph.ids().map(|id| (id, graph.dependencies(id).len())).collect();
    let mut ready: BinaryHeap<Reverse<&str>> =
        remaining.iter().filter(|(_, count)| **count == 0).map(|(id, _)| Reverse(*id)).collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id.to_string());
        for dependent in graph.dependents(id) {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
    }

    Ok(order)
}

/// Exact reverse of [`creation_order`].
pub fn deletion_order(graph: &DependencyGraph) -> Result<Vec<LogicalId>> {
    let mut order = creation_order(graph)?;
    order.reverse();
    Ok(order)
}

/// Resources of `resources` in creation order.
///
/// Builds the graph with [`GraphBuilder::new`], so only the resources themselves and
/// pseudo parameters are in scope.
pub fn resources_in_creation_order(resources: &ResourceSet) -> Result<Vec<&Resource>> {
    let graph = GraphBuilder::new(resources).build()?;
    let order = creation_order(&graph)?;
    Ok(order.iter().filter_map(|id| resources.get(id)).collect())
}

/// Resources of `resources` in deletion order.
pub fn resources_in_deletion_order(resources: &ResourceSet) -> Result<Vec<&Resource>> {
    let mut ordered = resources_in_creation_order(resources)?;
    ordered.reverse();
    Ok(ordered)
}

/// One strongly connected component, ordered for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionGroup {
    /// Members in emission order
    pub members: Vec<LogicalId>,
    /// For each member, the in-group dependencies emitted after it
    ///
    /// These are the references an emitter has to express with forward-reference
    /// syntax. Members without forward references have no entry.
    pub forward_references: BTreeMap<LogicalId, BTreeSet<LogicalId>>,
}

impl EmissionGroup {
    pub fn is_cycle(&self) -> bool {
        self.members.len() > 1
    }

    /// Total number of forward references in the group.
    pub fn forward_reference_count(&self) -> usize {
        self.forward_references.values().map(BTreeSet::len).sum()
    }
}

/// Order members of one component to minimise forward references.
///
/// Members depending on the fewest others in the group come first; ties go to the
/// smaller logical id.
fn order_members(graph: &DependencyGraph, members: &[LogicalId]) -> EmissionGroup {
    let in_group = |id: &str| -> Vec<&str> {
        graph.dependencies(id).into_iter().filter(|d| members.iter().any(|m| m == d)).collect()
    };

    let mut ordered: Vec<(usize, &LogicalId)> =
        members.iter().map(|id| (in_group(id).len(), id)).collect();
    ordered.sort();
    let ordered: Vec<LogicalId> = ordered.into_iter().map(|(_, id)| id.clone()).collect();

    let mut forward_references = BTreeMap::new();
    for (position, id) in ordered.iter().enumerate() {
        let later: BTreeSet<LogicalId> = in_group(id)
            .into_iter()
            .filter(|dep| ordered[position + 1..].iter().any(|m| m == dep))
            .map(str::to_string)
            .collect();
        if !later.is_empty() {
            forward_references.insert(id.clone(), later);
        }
    }

    EmissionGroup {
        members: ordered,
        forward_references,
    }
}

/// Components in dependency order, each ordered to minimise forward references.
///
/// Never fails on cycles: each cycle becomes one group. Groups are released with
/// Kahn's algorithm over the condensed graph, smallest first member first, so an
/// acyclic graph yields singleton groups in exactly [`creation_order`].
pub fn emission_order(graph: &DependencyGraph) -> Vec<EmissionGroup> {
    let components = find_sccs(graph);

    let mut component_of: BTreeMap<&str, usize> = BTreeMap::new();
    for (index, component) in components.iter().enumerate() {
        for member in component.members() {
            component_of.insert(member.as_str(), index);
        }
    }

    // dependency component -> dependent components
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
    let mut remaining: Vec<usize> = vec![0; components.len()];
    for (index, component) in components.iter().enumerate() {
        let deps: BTreeSet<usize> = component
            .members()
            .iter()
            .flat_map(|m| graph.dependencies(m))
            .filter_map(|d| component_of.get(d).copied())
            .filter(|&c| c != index)
            .collect();
        remaining[index] = deps.len();
        for dep in deps {
            dependents[dep].insert(index);
        }
    }

    let first_member =
        |index: usize| components[index].members().first().cloned().unwrap_or_default();
    let mut ready: BinaryHeap<Reverse<(LogicalId, usize)>> = remaining
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(index, _)| Reverse((first_member(index), index)))
        .collect();

    let mut groups = Vec::with_capacity(components.len());
    while let Some(Reverse((_, index))) = ready.pop() {
        let group = order_members(graph, components[index].members());
        if group.is_cycle() {
            debug!(
                "Emitting cycle [{}] with {} forward reference(s)",
                group.members.join(", "),
                group.forward_reference_count()
            );
        }
        groups.push(group);

        for &dependent in &dependents[index] {
            remaining[dependent] -= 1;
            if remaining[dependent] == 0 {
                ready.push(Reverse((first_member(dependent), dependent)));
            }
        }
    }

    groups
}
