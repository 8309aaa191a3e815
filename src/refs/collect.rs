//! Reference collection over value trees.

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use super::{IntrinsicKind, LogicalId, ReferenceValue, is_pseudo_parameter};

static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").ok());

/// One `${...}` placeholder in a `Fn::Sub` template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Placeholder {
    /// The referenced name (text before the first dot)
    pub name: String,
    /// The attribute for `${Name.Attr}` placeholders
    pub attribute: Option<String>,
}

/// How a [`ReferenceSite`] names its target.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReferenceKind {
    /// `Ref`
    Ref,
    /// `Fn::GetAtt`
    Attr(String),
    /// `Condition`
    Condition,
    /// `${Name}` or `${Name.Attr}` inside a `Fn::Sub` template
    Placeholder(Option<String>),
}

impl ReferenceKind {
    /// Whether the reference requires a resource (rather than a parameter) target.
    pub const fn requires_resource(&self) -> bool {
        matches!(self, Self::Attr(_) | Self::Placeholder(Some(_)))
    }
}

/// A single reference found in a value tree, with its structural path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReferenceSite {
    /// Path from the walked root, e.g. `Properties.Tags[0].Value`
    pub path: String,
    /// The named logical id
    pub target: LogicalId,
    /// The reference form
    pub kind: ReferenceKind,
}

impl fmt::Display for ReferenceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ReferenceKind::Ref => write!(f, "Ref {} at {}", self.target, self.path),
            ReferenceKind::Attr(attribute) | ReferenceKind::Placeholder(Some(attribute)) => {
                write!(f, "{}.{} at {}", self.target, attribute, self.path)
            }
            ReferenceKind::Condition => write!(f, "Condition {} at {}", self.target, self.path),
            ReferenceKind::Placeholder(None) => write!(f, "${{{}}} at {}", self.target, self.path),
        }
    }
}

pub(crate) fn child_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Visit every node of `value` in document order, with its structural path.
///
/// Map entries are visited in key order. Intrinsic arguments live under the wire key
/// (`Fn::Join[1]`); single-argument intrinsics have no index suffix.
pub fn walk<'a, F>(value: &'a ReferenceValue, path: &str, visitor: &mut F)
where
    F: FnMut(&'a ReferenceValue, &str),
{
    visitor(value, path);
    match value {
        ReferenceValue::List(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{path}[{i}]"), visitor);
            }
        }
        ReferenceValue::Map(entries) => {
            for (key, item) in entries {
                walk(item, &child_path(path, key), visitor);
            }
        }
        ReferenceValue::Intrinsic(intrinsic) => {
            let base = child_path(path, &intrinsic.kind().wire_name());
            let args = intrinsic.args();
            if args.len() == 1 {
                walk(&args[0], &base, visitor);
            } else {
                for (i, arg) in args.iter().enumerate() {
                    walk(arg, &format!("{base}[{i}]"), visitor);
                }
            }
        }
        ReferenceValue::Literal(_)
        | ReferenceValue::Ref(_)
        | ReferenceValue::Attr {
            ..
        }
        | ReferenceValue::ConditionRef(_) => {}
    }
}

/// Extract the placeholders of a `Fn::Sub` template.
///
/// Escaped placeholders (`${!Literal}`) are skipped. Pseudo parameters are returned;
/// callers filter them.
pub fn interpolation_placeholders(template: &str) -> Vec<Placeholder> {
    let Some(pattern) = PLACEHOLDER.as_ref() else {
        return Vec::new();
    };

    pattern
        .captures_iter(template)
        .filter_map(|caps| {
            let inner = caps.get(1)?.as_str().trim();
            if inner.starts_with('!') || inner.is_empty() {
                return None;
            }
            let placeholder = match inner.split_once('.') {
                Some((name, attribute)) => Placeholder {
                    name: name.to_string(),
                    attribute: Some(attribute.to_string()),
                },
                None => Placeholder {
                    name: inner.to_string(),
                    attribute: None,
                },
            };
            Some(placeholder)
        })
        .collect()
}

/// Every reference in `value`, with the path where it occurs.
///
/// `base_path` prefixes every reported path. `Fn::Sub` placeholders are included unless
/// they name a pseudo parameter or a variable bound by the `Fn::Sub` map.
pub fn collect_reference_sites(value: &ReferenceValue, base_path: &str) -> Vec<ReferenceSite> {
    let mut sites = Vec::new();
    walk(value, base_path, &mut |node, path| match node {
        ReferenceValue::Ref(target) => sites.push(ReferenceSite {
            path: path.to_string(),
            target: target.clone(),
            kind: ReferenceKind::Ref,
        }),
        ReferenceValue::Attr {
            target,
            attribute,
        } => sites.push(ReferenceSite {
            path: path.to_string(),
            target: target.clone(),
            kind: ReferenceKind::Attr(attribute.clone()),
        }),
        ReferenceValue::ConditionRef(name) => sites.push(ReferenceSite {
            path: path.to_string(),
            target: name.clone(),
            kind: ReferenceKind::Condition,
        }),
        ReferenceValue::Intrinsic(intrinsic) if intrinsic.kind() == IntrinsicKind::Sub => {
            let Some(template) = intrinsic.sub_template() else {
                return;
            };
            let bound = intrinsic.sub_variables();
            for placeholder in interpolation_placeholders(template) {
                if is_pseudo_parameter(&placeholder.name)
                    || bound.is_some_and(|vars| vars.contains_key(&placeholder.name))
                {
                    continue;
                }
                sites.push(ReferenceSite {
                    path: path.to_string(),
                    target: placeholder.name,
                    kind: ReferenceKind::Placeholder(placeholder.attribute),
                });
            }
        }
        _ => {}
    });
    sites
}

/// Every logical id `value` depends on.
///
/// Covers `Ref`, `Fn::GetAtt` and `Condition` nodes at any depth, plus `Fn::Sub`
/// placeholders. Pseudo-parameter `Ref`s are included; scope resolution filters them.
pub fn collect_references(value: &ReferenceValue) -> BTreeSet<LogicalId> {
    collect_reference_sites(value, "").into_iter().map(|site| site.target).collect()
}
