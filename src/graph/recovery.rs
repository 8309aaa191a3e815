//! Heuristic dependency recovery from `Fn::Sub` strings.
//!
//! Imported templates often spell a dependency as a string instead of a reference, e.g.
//! `!Sub "arn:${AWS::Partition}:s3:::${AWS::StackName}-logs/*"` where a bucket named
//! `${AWS::StackName}-logs` lives in the same template. [`PatternIndex`] precomputes,
//! once per template, the strings each resource is conventionally known by:
//!
//! - **name patterns**: the value of the resource's name property (`BucketName`)
//! - **ARN patterns**: every configured ARN template with `{name}` filled in
//!
//! A `Fn::Sub` whose whole template string equals one of those patterns recovers an
//! edge to the resource that produced it. Matches are exact; a pattern produced by more
//! than one resource is reported as [`AmbiguousRecovery`] and never becomes an edge.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{trace, warn};

use super::builder::Scope;
use crate::config::RecoveryConfig;
use crate::refs::{
    IntrinsicKind, LogicalId, ReferenceValue, collect_references, interpolation_placeholders,
    is_pseudo_parameter, walk,
};
use crate::template::{Resource, ResourceSet};

/// A `Fn::Sub` string matching patterns of several resources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AmbiguousRecovery {
    /// Resource holding the `Fn::Sub`
    pub source: LogicalId,
    /// Property path of the `Fn::Sub`
    pub path: String,
    /// The template string that matched
    pub pattern: String,
    /// Every resource producing the pattern, sorted
    pub candidates: Vec<LogicalId>,
}

impl fmt::Display for AmbiguousRecovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}: '{}' matches {} resources ({}); no dependency recorded",
            self.source,
            self.path,
            self.pattern,
            self.candidates.len(),
            self.candidates.join(", ")
        )
    }
}

/// An edge found by recovery.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecoveredEdge {
    /// The resource depended on
    pub target: LogicalId,
    /// Property path of the `Fn::Sub` that matched
    pub path: String,
}

/// Result of recovering one resource's dependencies.
#[derive(Debug, Clone, Default)]
pub struct RecoveryOutcome {
    pub edges: Vec<RecoveredEdge>,
    pub warnings: Vec<AmbiguousRecovery>,
}

/// Name and ARN pattern maps for one template.
#[derive(Debug, Clone, Default)]
pub struct PatternIndex {
    names: BTreeMap<String, BTreeSet<LogicalId>>,
    arns: BTreeMap<String, BTreeSet<LogicalId>>,
}

/// The string a resource's name property evaluates to, when it is knowable statically.
fn name_value(value: &ReferenceValue) -> Option<&str> {
    match value {
        ReferenceValue::Intrinsic(intrinsic)
            if intrinsic.kind() == IntrinsicKind::Sub && intrinsic.args().len() == 1 =>
        {
            intrinsic.sub_template()
        }
        other => other.as_str(),
    }
}

impl PatternIndex {
    /// Precompute both pattern maps for `resources`.
    pub fn build(resources: &ResourceSet, config: &RecoveryConfig) -> Self {
        let mut index = Self::default();

        for (id, resource) in resources {
            let Some(name) = config
                .name_property(resource.type_name())
                .and_then(|property| resource.property(property))
                .and_then(name_value)
            else {
                continue;
            };

            index.names.entry(name.to_string()).or_default().insert(id.clone());
            for template in config.arn_templates(resource.type_name()) {
                let arn = template.replace("{name}", name);
                index.arns.entry(arn).or_default().insert(id.clone());
            }
        }

        trace!("Pattern index: {} name pattern(s), {} ARN pattern(s)", index.names.len(), index.arns.len());
        index
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.arns.is_empty()
    }

    /// Resources producing `pattern`, by name or by ARN, excluding `exclude`.
    pub fn candidates(&self, pattern: &str, exclude: &str) -> Vec<LogicalId> {
        let by_name = self.names.get(pattern).into_iter().flatten();
        let by_arn = self.arns.get(pattern).into_iter().flatten();
        by_name
            .chain(by_arn)
            .filter(|id| id.as_str() != exclude)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Recover the implicit dependencies of `resource`.
    ///
    /// A `Fn::Sub` is skipped when it already references a resource explicitly, or when
    /// it has placeholders and every one of them is a declared parameter.
    pub fn recover(&self, resource: &Resource, scope: &Scope) -> RecoveryOutcome {
        let mut outcome = RecoveryOutcome::default();
        if self.is_empty() {
            return outcome;
        }

        let source = resource.logical_id();
        for (name, value) in resource.properties() {
            let base = format!("Properties.{name}");
            walk(value, &base, &mut |node, path| {
                let ReferenceValue::Intrinsic(intrinsic) = node else {
                    return;
                };
                let Some(template) = intrinsic.sub_template() else {
                    return;
                };

                if collect_references(node).iter().any(|id| scope.is_resource(id)) {
                    return;
                }
                let placeholders: Vec<String> = interpolation_placeholders(template)
                    .into_iter()
                    .map(|p| p.name)
                    .filter(|name| !is_pseudo_parameter(name))
                    .collect();
                if !placeholders.is_empty() && placeholders.iter().all(|p| scope.is_parameter(p)) {
                    return;
                }

                let candidates = self.candidates(template, source);
                match candidates.len() {
                    0 => {}
                    1 => outcome.edges.push(RecoveredEdge {
                        target: candidates[0].clone(),
                        path: path.to_string(),
                    }),
                    _ => {
                        let warning = AmbiguousRecovery {
                            source: source.to_string(),
                            path: path.to_string(),
                            pattern: template.to_string(),
                            candidates,
                        };
                        warn!("Ambiguous dependency recovery: {}", warning);
                        outcome.warnings.push(warning);
                    }
                }
            });
        }

        outcome
    }
}
