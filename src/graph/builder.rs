//! Dependency graph derivation.
//!
//! [`GraphBuilder`] turns a resource set into a [`DependencyGraph`]: one node per
//! resource, one edge per "depends on" relationship. References to parameters and pseudo
//! parameters are tracked beside the graph and never become ordering edges.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;
use strsim::levenshtein;
use tracing::debug;

use super::recovery::{AmbiguousRecovery, PatternIndex};
use crate::config::RecoveryConfig;
use crate::core::{Result, StackError};
use crate::refs::{LogicalId, ReferenceKind, ReferenceSite, collect_reference_sites, is_pseudo_parameter};
use crate::template::{Output, ResourceSet, Template};

/// Maximum Levenshtein distance, as a percentage of the target length, for suggestions.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// A `Ref`, `Fn::GetAtt` or `Fn::Sub` placeholder in the properties
    Reference,
    /// An explicit `DependsOn` entry
    DependsOn,
    /// Inferred from a `Fn::Sub` string matching another resource's pattern
    Recovered,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::DependsOn => write!(f, "depends-on"),
            Self::Recovered => write!(f, "recovered"),
        }
    }
}

/// What kind of logical id a reference must name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExpectedTarget {
    Resource,
    ResourceOrParameter,
    Condition,
}

impl fmt::Display for ExpectedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource => write!(f, "resource"),
            Self::ResourceOrParameter => write!(f, "resource or parameter"),
            Self::Condition => write!(f, "condition"),
        }
    }
}

/// A reference whose target is not in scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnresolvedReference {
    /// Resource, condition or output holding the reference
    pub source: LogicalId,
    /// Property path of the reference inside `source`
    pub path: String,
    /// The missing logical id
    pub target: LogicalId,
    /// What the reference needed to name
    pub expected: ExpectedTarget,
    /// Similar ids that are in scope
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} references '{}' at {}, but no {} has that name",
            self.source, self.target, self.path, self.expected
        )?;
        if !self.suggestions.is_empty() {
            let quoted: Vec<String> = self.suggestions.iter().map(|s| format!("'{s}'")).collect();
            write!(f, " (did you mean {}?)", quoted.join(", "))?;
        }
        Ok(())
    }
}

/// Ids visible to reference resolution.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    resources: BTreeSet<LogicalId>,
    parameters: BTreeSet<LogicalId>,
    conditions: BTreeSet<String>,
}

enum Resolved {
    Resource,
    Parameter,
    Condition,
    Missing(ExpectedTarget),
}

impl Scope {
    pub fn is_resource(&self, id: &str) -> bool {
        self.resources.contains(id)
    }

    /// Declared parameter or pseudo parameter.
    pub fn is_parameter(&self, id: &str) -> bool {
        self.parameters.contains(id) || is_pseudo_parameter(id)
    }

    pub fn is_condition(&self, name: &str) -> bool {
        self.conditions.contains(name)
    }

    fn resolve(&self, target: &str, kind: &ReferenceKind) -> Resolved {
        match kind {
            ReferenceKind::Condition => {
                if self.is_condition(target) {
                    Resolved::Condition
                } else {
                    Resolved::Missing(ExpectedTarget::Condition)
                }
            }
            _ if self.is_resource(target) => Resolved::Resource,
            kind if kind.requires_resource() => Resolved::Missing(ExpectedTarget::Resource),
            _ if self.is_parameter(target) => Resolved::Parameter,
            _ => Resolved::Missing(ExpectedTarget::ResourceOrParameter),
        }
    }

    fn suggestions(&self, target: &str, expected: ExpectedTarget) -> Vec<String> {
        let candidates: Vec<&String> = match expected {
            ExpectedTarget::Resource => self.resources.iter().collect(),
            ExpectedTarget::ResourceOrParameter => {
                self.resources.iter().chain(self.parameters.iter()).collect()
            }
            ExpectedTarget::Condition => self.conditions.iter().collect(),
        };

        let mut scored: Vec<(usize, &String)> =
            candidates.into_iter().map(|c| (levenshtein(target, c), c)).collect();
        scored.sort();

        scored
            .into_iter()
            .filter(|(dist, _)| *dist <= target.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
            .take(3)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

/// Directed graph of logical id → logical ids it depends on.
///
/// Derived data: rebuild it whenever the resource set changes. Nodes are inserted in
/// logical-id order and every query returns ids sorted, so results never depend on hash
/// or insertion order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<LogicalId, EdgeKind>,
    node_map: BTreeMap<LogicalId, NodeIndex>,
    parameter_refs: BTreeMap<LogicalId, BTreeSet<LogicalId>>,
    warnings: Vec<AmbiguousRecovery>,
}

impl DependencyGraph {
    fn with_nodes<'a>(ids: impl IntoIterator<Item = &'a LogicalId>) -> Self {
        let mut graph = Self::default();
        for id in ids {
            let index = graph.graph.add_node(id.clone());
            graph.node_map.insert(id.clone(), index);
        }
        graph
    }

    /// Build a graph from a plain adjacency map.
    ///
    /// Every node named as a dependency must also be a key.
    ///
    /// # Errors
    ///
    /// - [`StackError::UnresolvedReferences`] for dependencies that are not keys
    /// - [`StackError::SelfReference`] for a node depending on itself
    pub fn from_map(map: &BTreeMap<LogicalId, BTreeSet<LogicalId>>) -> Result<Self> {
        let mut graph = Self::with_nodes(map.keys());
        let scope = Scope {
            resources: map.keys().cloned().collect(),
            ..Scope::default()
        };

        let mut unresolved = Vec::new();
        for (source, targets) in map {
            for target in targets {
                if target == source {
                    return Err(StackError::SelfReference {
                        logical_id: source.clone(),
                        path: "<graph>".to_string(),
                    });
                }
                if graph.node_map.contains_key(target) {
                    graph.add_edge(source, target, EdgeKind::Reference);
                } else {
                    unresolved.push(UnresolvedReference {
                        source: source.clone(),
                        path: "<graph>".to_string(),
                        target: target.clone(),
                        expected: ExpectedTarget::Resource,
                        suggestions: scope.suggestions(target, ExpectedTarget::Resource),
                    });
                }
            }
        }

        if unresolved.is_empty() {
            Ok(graph)
        } else {
            Err(StackError::UnresolvedReferences {
                references: unresolved,
            })
        }
    }

    /// Add `from → to` unless an edge already exists. Returns whether one was added.
    fn add_edge(&mut self, from: &str, to: &str, kind: EdgeKind) -> bool {
        let (Some(&from_idx), Some(&to_idx)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return false;
        };
        if self.graph.contains_edge(from_idx, to_idx) {
            return false;
        }
        self.graph.add_edge(from_idx, to_idx, kind);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    /// Every node, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.node_map.keys().map(String::as_str)
    }

    /// Direct dependencies of `id`, sorted.
    pub fn dependencies(&self, id: &str) -> Vec<&str> {
        let Some(&index) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut deps: Vec<&str> =
            self.graph.neighbors(index).map(|n| self.graph[n].as_str()).collect();
        deps.sort_unstable();
        deps
    }

    /// Resources that depend directly on `id`, sorted.
    pub fn dependents(&self, id: &str) -> Vec<&str> {
        let Some(&index) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut dependents: Vec<&str> = self
            .graph
            .neighbors_directed(index, petgraph::Direction::Incoming)
            .map(|n| self.graph[n].as_str())
            .collect();
        dependents.sort_unstable();
        dependents
    }

    /// Why `from` depends on `to`, if it does.
    pub fn edge_kind(&self, from: &str, to: &str) -> Option<EdgeKind> {
        let from_idx = *self.node_map.get(from)?;
        let to_idx = *self.node_map.get(to)?;
        self.graph.find_edge(from_idx, to_idx).map(|e| self.graph[e])
    }

    /// Everything `id` depends on, directly or indirectly.
    pub fn transitive_dependencies(&self, id: &str) -> BTreeSet<&str> {
        let mut deps = BTreeSet::new();
        let mut queue = VecDeque::new();

        if let Some(&index) = self.node_map.get(id) {
            queue.push_back(index);
            while let Some(current) = queue.pop_front() {
                for neighbor in self.graph.neighbors(current) {
                    if deps.insert(self.graph[neighbor].as_str()) {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        deps
    }

    /// Parameters and pseudo parameters referenced by resource `id`.
    pub fn parameter_references(&self, id: &str) -> BTreeSet<&str> {
        self.parameter_refs
            .get(id)
            .map(|params| params.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Edges inferred by heuristic recovery, sorted.
    pub fn recovered_edges(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .graph
            .edge_references()
            .filter(|e| *e.weight() == EdgeKind::Recovered)
            .map(|e| (self.graph[e.source()].as_str(), self.graph[e.target()].as_str()))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Ambiguous recovery matches found while building, sorted.
    pub fn warnings(&self) -> &[AmbiguousRecovery] {
        &self.warnings
    }

    /// Plain adjacency map view.
    pub fn to_map(&self) -> BTreeMap<LogicalId, BTreeSet<LogicalId>> {
        self.node_map
            .keys()
            .map(|id| {
                let deps = self.dependencies(id).into_iter().map(str::to_string).collect();
                (id.clone(), deps)
            })
            .collect()
    }

    /// Box-drawing dependency tree rooted at `root`.
    ///
    /// A node already on the current path is marked `(circular reference)`; a node
    /// expanded elsewhere in the tree is marked `(already shown)`.
    pub fn render_tree(&self, root: &str) -> String {
        let mut result = String::new();
        let mut shown = HashSet::new();
        let mut path = Vec::new();
        result.push_str(root);
        result.push('\n');
        if self.contains(root) {
            shown.insert(root.to_string());
            path.push(root.to_string());
            self.render_children(root, "", &mut result, &mut shown, &mut path);
        }
        result
    }

    fn render_children(
        &self,
        node: &str,
        prefix: &str,
        result: &mut String,
        shown: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) {
        let deps = self.dependencies(node);
        for (i, dep) in deps.iter().enumerate() {
            let is_last = i == deps.len() - 1;
            let connector = if is_last {
                "└── "
            } else {
                "├── "
            };
            let child_prefix = if is_last {
                format!("{prefix}    ")
            } else {
                format!("{prefix}│   ")
            };

            if path.iter().any(|p| p == dep) {
                result.push_str(&format!("{prefix}{connector}{dep} (circular reference)\n"));
            } else if !shown.insert((*dep).to_string()) {
                result.push_str(&format!("{prefix}{connector}{dep} (already shown)\n"));
            } else {
                result.push_str(&format!("{prefix}{connector}{dep}\n"));
                path.push((*dep).to_string());
                self.render_children(dep, &child_prefix, result, shown, path);
                path.pop();
            }
        }
    }
}

/// Derives a [`DependencyGraph`] from a resource set.
///
/// ```rust
/// use stackgraph::graph::GraphBuilder;
/// use stackgraph::refs;
/// use stackgraph::template::{Resource, resource_set};
///
/// let resources = resource_set([
///     Resource::builder("Network", "AWS::EC2::VPC").build(),
///     Resource::builder("Subnet", "AWS::EC2::Subnet")
///         .property("VpcId", refs::reference("Network"))
///         .build(),
/// ]);
/// let graph = GraphBuilder::new(&resources).build().unwrap();
/// assert_eq!(graph.dependencies("Subnet"), vec!["Network"]);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct GraphBuilder<'a> {
    resources: &'a ResourceSet,
    scope: Scope,
    conditions: Option<&'a BTreeMap<String, crate::refs::ReferenceValue>>,
    outputs: Option<&'a BTreeMap<LogicalId, Output>>,
    recovery: Option<&'a RecoveryConfig>,
}

impl<'a> GraphBuilder<'a> {
    /// Builder over a bare resource set. Only pseudo parameters are in scope besides the
    /// resources themselves.
    pub fn new(resources: &'a ResourceSet) -> Self {
        Self {
            resources,
            scope: Scope {
                resources: resources.keys().cloned().collect(),
                ..Scope::default()
            },
            conditions: None,
            outputs: None,
            recovery: None,
        }
    }

    /// Builder over a whole template: its parameters and conditions are in scope, and
    /// condition and output expressions are validated too.
    pub fn for_template(template: &'a Template) -> Self {
        let mut builder = Self::new(&template.resources)
            .with_parameters(template.parameters.keys().cloned())
            .with_conditions(template.conditions.keys().cloned());
        builder.conditions = Some(&template.conditions);
        builder.outputs = Some(&template.outputs);
        builder
    }

    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = LogicalId>) -> Self {
        self.scope.parameters.extend(parameters);
        self
    }

    pub fn with_conditions(mut self, conditions: impl IntoIterator<Item = String>) -> Self {
        self.scope.conditions.extend(conditions);
        self
    }

    /// Enable heuristic recovery from `Fn::Sub` strings. Ignored when disabled in
    /// `config`.
    pub fn with_recovery(mut self, config: &'a RecoveryConfig) -> Self {
        self.recovery = config.enabled.then_some(config);
        self
    }

    /// Ids visible to reference resolution.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Derive the graph.
    ///
    /// # Errors
    ///
    /// - [`StackError::UnresolvedReferences`] listing every reference that names an id
    ///   out of scope, across resources, conditions and outputs
    /// - [`StackError::SelfReference`] when a resource references itself
    pub fn build(self) -> Result<DependencyGraph> {
        let mut graph = DependencyGraph::with_nodes(self.resources.keys());
        let mut unresolved = Vec::new();
        let mut self_refs = Vec::new();

        for (id, resource) in self.resources {
            let mut sites = Vec::new();
            for (name, value) in resource.properties() {
                sites.extend(
                    collect_reference_sites(value, &format!("Properties.{name}"))
                        .into_iter()
                        .map(|site| (site, EdgeKind::Reference)),
                );
            }
            if let Some(condition) = resource.condition() {
                sites.push((
                    ReferenceSite {
                        path: "Condition".to_string(),
                        target: condition.to_string(),
                        kind: ReferenceKind::Condition,
                    },
                    EdgeKind::Reference,
                ));
            }

            for (site, edge_kind) in sites {
                match self.scope.resolve(&site.target, &site.kind) {
                    Resolved::Resource if site.target == *id => self_refs.push((id, site.path)),
                    Resolved::Resource => {
                        graph.add_edge(id, &site.target, edge_kind);
                    }
                    Resolved::Parameter => {
                        graph.parameter_refs.entry(id.clone()).or_default().insert(site.target);
                    }
                    Resolved::Condition => {}
                    Resolved::Missing(expected) => {
                        unresolved.push(self.unresolved(id, site, expected));
                    }
                }
            }

            // DependsOn must name a resource; parameters are not allowed.
            for (i, target) in resource.depends_on().iter().enumerate() {
                let path = format!("DependsOn[{i}]");
                if target == id {
                    self_refs.push((id, path));
                } else if self.scope.is_resource(target) {
                    graph.add_edge(id, target, EdgeKind::DependsOn);
                } else {
                    let site = ReferenceSite {
                        path,
                        target: target.clone(),
                        kind: ReferenceKind::Ref,
                    };
                    unresolved.push(self.unresolved(id, site, ExpectedTarget::Resource));
                }
            }
        }

        if let Some(conditions) = self.conditions {
            for (name, value) in conditions {
                for site in collect_reference_sites(value, &format!("Conditions.{name}")) {
                    if let Resolved::Missing(expected) = self.scope.resolve(&site.target, &site.kind) {
                        unresolved.push(self.unresolved(name, site, expected));
                    }
                }
            }
        }

        if let Some(outputs) = self.outputs {
            for (id, output) in outputs {
                let mut sites = collect_reference_sites(&output.value, "Value");
                if let Some(name) = &output.export_name {
                    sites.extend(collect_reference_sites(name, "Export.Name"));
                }
                if let Some(condition) = &output.condition {
                    sites.push(ReferenceSite {
                        path: "Condition".to_string(),
                        target: condition.clone(),
                        kind: ReferenceKind::Condition,
                    });
                }
                for site in sites {
                    if let Resolved::Missing(expected) = self.scope.resolve(&site.target, &site.kind) {
                        unresolved.push(self.unresolved(id, site, expected));
                    }
                }
            }
        }

        if !unresolved.is_empty() {
            unresolved.sort();
            return Err(StackError::UnresolvedReferences {
                references: unresolved,
            });
        }

        if let Some((id, path)) = self_refs.into_iter().next() {
            return Err(StackError::SelfReference {
                logical_id: id.clone(),
                path,
            });
        }

        if let Some(config) = self.recovery {
            let index = PatternIndex::build(self.resources, config);
            let mut warnings = Vec::new();
            for (id, resource) in self.resources {
                let outcome = index.recover(resource, &self.scope);
                for edge in outcome.edges {
                    if graph.add_edge(id, &edge.target, EdgeKind::Recovered) {
                        debug!("Recovered dependency {} -> {} from {}", id, edge.target, edge.path);
                    }
                }
                warnings.extend(outcome.warnings);
            }
            warnings.sort();
            graph.warnings = warnings;
        }

        Ok(graph)
    }

    fn unresolved(&self, source: &str, site: ReferenceSite, expected: ExpectedTarget) -> UnresolvedReference {
        UnresolvedReference {
            source: source.to_string(),
            suggestions: self.scope.suggestions(&site.target, expected),
            path: site.path,
            target: site.target,
            expected,
        }
    }
}
