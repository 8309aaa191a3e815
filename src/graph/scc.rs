//! Strongly connected components.
//!
//! [`find_sccs`] is Tarjan's algorithm driven by an explicit stack, so graph depth is
//! bounded by memory rather than by the call stack. Roots and successors are visited in
//! logical-id order, which makes the output reproducible for equal graphs.

use std::fmt;

use super::builder::DependencyGraph;
use crate::core::{Result, StackError};
use crate::refs::LogicalId;

/// A strongly connected component: a cycle, or a single node outside any cycle.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StronglyConnectedComponent {
    members: Vec<LogicalId>,
}

impl StronglyConnectedComponent {
    /// Members, sorted by logical id.
    pub fn members(&self) -> &[LogicalId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.members.binary_search_by(|m| m.as_str().cmp(id)).is_ok()
    }

    /// A single node. Self-loops are rejected when the graph is built, so a trivial
    /// component is never a cycle.
    pub fn is_trivial(&self) -> bool {
        self.members.len() == 1
    }
}

impl fmt::Display for StronglyConnectedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.members.join(", "))
    }
}

#[derive(Clone, Copy)]
struct NodeState {
    index: usize,
    lowlink: usize,
    on_stack: bool,
}

/// Partition the graph into strongly connected components.
///
/// Components come back dependencies first: every component appears after all the
/// components it depends on, so the list is a valid creation order of components.
/// Every node appears in exactly one component, trivial ones included.
pub fn find_sccs(graph: &DependencyGraph) -> Vec<StronglyConnectedComponent> {
    let ids: Vec<&str> = graph.ids().collect();
    let position = |id: &str| ids.binary_search(&id).ok();

    let successors: Vec<Vec<usize>> = ids
        .iter()
        .map(|id| graph.dependencies(id).into_iter().filter_map(position).collect())
        .collect();

    let mut state: Vec<Option<NodeState>> = vec![None; ids.len()];
    let mut stack: Vec<usize> = Vec::new();
    let mut components = Vec::new();
    let mut counter = 0;

    for root in 0..ids.len() {
        if state[root].is_some() {
            continue;
        }

        // (node, next successor to visit)
        let mut call_stack: Vec<(usize, usize)> = Vec::new();
        state[root] = Some(NodeState {
            index: counter,
            lowlink: counter,
            on_stack: true,
        });
        counter += 1;
        stack.push(root);
        call_stack.push((root, 0));

        while let Some(frame) = call_stack.last_mut() {
            let (node, next) = *frame;

            if let Some(&successor) = successors[node].get(next) {
                frame.1 += 1;
                match state[successor] {
                    None => {
                        state[successor] = Some(NodeState {
                            index: counter,
                            lowlink: counter,
                            on_stack: true,
                        });
                        counter += 1;
                        stack.push(successor);
                        call_stack.push((successor, 0));
                    }
                    Some(succ) if succ.on_stack => {
                        if let Some(current) = state[node].as_mut() {
                            current.lowlink = current.lowlink.min(succ.index);
                        }
                    }
                    Some(_) => {}
                }
                continue;
            }

            call_stack.pop();
            let Some(current) = state[node] else {
                continue;
            };

            if let Some(&(parent, _)) = call_stack.last()
                && let Some(parent_state) = state[parent].as_mut()
            {
                parent_state.lowlink = parent_state.lowlink.min(current.lowlink);
            }

            if current.lowlink == current.index {
                let mut members = Vec::new();
                while let Some(member) = stack.pop() {
                    if let Some(member_state) = state[member].as_mut() {
                        member_state.on_stack = false;
                    }
                    members.push(ids[member].to_string());
                    if member == node {
                        break;
                    }
                }
                members.sort_unstable();
                components.push(StronglyConnectedComponent {
                    members,
                });
            }
        }
    }

    components
}

/// Non-trivial components only, each sorted, ordered by first member.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<StronglyConnectedComponent> {
    let mut cycles: Vec<_> = find_sccs(graph).into_iter().filter(|c| !c.is_trivial()).collect();
    cycles.sort();
    cycles
}

/// Fail with [`StackError::CircularDependency`] naming every cyclic member.
pub fn ensure_acyclic(graph: &DependencyGraph) -> Result<()> {
    let cycles = detect_cycles(graph);
    if cycles.is_empty() {
        Ok(())
    } else {
        Err(StackError::CircularDependency {
            cycles: cycles.into_iter().map(|c| c.members).collect(),
        })
    }
}
