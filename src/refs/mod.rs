//! Typed reference and intrinsic value model
//!
//! Every property value of a resource is a [`ReferenceValue`] tree. Leaves are literals or
//! references to other logical ids; interior nodes are lists, maps and validated
//! [`Intrinsic`] operations whose arguments nest further values.
//!
//! References are built explicitly with ordinary functions rather than discovered by
//! inspecting strings:
//!
//! ```rust
//! use stackgraph::refs::{self, ReferenceValue};
//!
//! let value = refs::join(
//!     ",",
//!     vec![refs::reference("Subnet"), refs::attr("Bucket", "Arn")],
//! )
//! .unwrap();
//!
//! let targets = refs::collect_references(&value);
//! assert!(targets.contains("Subnet"));
//! assert!(targets.contains("Bucket"));
//! assert_eq!(ReferenceValue::from("plain").as_str(), Some("plain"));
//! ```
//!
//! [`collect_references`] is the single answer to "what does this value depend on" and
//! never fails, since malformed intrinsics are rejected by [`Intrinsic::new`].

mod collect;
mod intrinsic;

pub use collect::{
    Placeholder, ReferenceKind, ReferenceSite, collect_reference_sites, collect_references,
    interpolation_placeholders, walk,
};
pub use intrinsic::{Intrinsic, IntrinsicKind};

use std::collections::BTreeMap;

use crate::core::Result;

/// Identifier of a resource, parameter or condition within one template.
pub type LogicalId = String;

/// Pseudo parameters that are always in scope.
pub const PSEUDO_PARAMETERS: [&str; 8] = [
    "AWS::AccountId",
    "AWS::NotificationARNs",
    "AWS::NoValue",
    "AWS::Partition",
    "AWS::Region",
    "AWS::StackId",
    "AWS::StackName",
    "AWS::URLSuffix",
];

/// Whether `id` names a pseudo parameter.
pub fn is_pseudo_parameter(id: &str) -> bool {
    PSEUDO_PARAMETERS.contains(&id)
}

/// A literal leaf value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// A property value: a recursive expression tree of literals, references and intrinsics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceValue {
    /// A literal leaf
    Literal(Scalar),
    /// An ordered list of values
    List(Vec<ReferenceValue>),
    /// A keyed map of values
    Map(BTreeMap<String, ReferenceValue>),
    /// Reference by identity to a resource or parameter
    Ref(LogicalId),
    /// Reference to a computed attribute of a resource
    Attr {
        /// The resource
        target: LogicalId,
        /// Attribute name, e.g. `Arn`
        attribute: String,
    },
    /// A computed-value operation
    Intrinsic(Intrinsic),
    /// Reference to a named condition
    ConditionRef(String),
}

impl ReferenceValue {
    /// The null literal.
    pub const fn null() -> Self {
        Self::Literal(Scalar::Null)
    }

    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = ReferenceValue>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// Build a map value.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ReferenceValue)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The string content of a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Literal(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The intrinsic node, if this value is one.
    pub fn as_intrinsic(&self) -> Option<&Intrinsic> {
        match self {
            Self::Intrinsic(intrinsic) => Some(intrinsic),
            _ => None,
        }
    }

    /// Whether the tree contains no reference to any logical id.
    pub fn is_literal(&self) -> bool {
        collect_references(self).is_empty()
    }

    /// Convert a plain JSON document into a literal tree.
    ///
    /// Objects become [`ReferenceValue::Map`]; no intrinsic detection is performed.
    pub fn from_literal_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::null(),
            serde_json::Value::Bool(b) => Self::Literal(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => Self::Literal(Scalar::Number(n.clone())),
            serde_json::Value::String(s) => Self::Literal(Scalar::String(s.clone())),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_literal_json).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries.iter().map(|(k, v)| (k.clone(), Self::from_literal_json(v))).collect(),
            ),
        }
    }
}

impl From<&str> for ReferenceValue {
    fn from(value: &str) -> Self {
        Self::Literal(Scalar::String(value.to_string()))
    }
}

impl From<String> for ReferenceValue {
    fn from(value: String) -> Self {
        Self::Literal(Scalar::String(value))
    }
}

impl From<bool> for ReferenceValue {
    fn from(value: bool) -> Self {
        Self::Literal(Scalar::Bool(value))
    }
}

impl From<i64> for ReferenceValue {
    fn from(value: i64) -> Self {
        Self::Literal(Scalar::Number(value.into()))
    }
}

impl From<Intrinsic> for ReferenceValue {
    fn from(value: Intrinsic) -> Self {
        Self::Intrinsic(value)
    }
}

impl From<Vec<ReferenceValue>> for ReferenceValue {
    fn from(value: Vec<ReferenceValue>) -> Self {
        Self::List(value)
    }
}

/// `Ref` to a resource or parameter.
pub fn reference(target: impl Into<LogicalId>) -> ReferenceValue {
    ReferenceValue::Ref(target.into())
}

/// Attribute reference, e.g. `attr("Bucket", "Arn")`.
pub fn attr(target: impl Into<LogicalId>, attribute: impl Into<String>) -> ReferenceValue {
    ReferenceValue::Attr {
        target: target.into(),
        attribute: attribute.into(),
    }
}

/// Reference to a named condition.
pub fn condition(name: impl Into<String>) -> ReferenceValue {
    ReferenceValue::ConditionRef(name.into())
}

/// Validated intrinsic node as a value.
pub fn intrinsic(kind: IntrinsicKind, args: Vec<ReferenceValue>) -> Result<ReferenceValue> {
    Intrinsic::new(kind, args).map(ReferenceValue::Intrinsic)
}

/// `Fn::Sub` without a variable map.
pub fn sub(template: impl Into<String>) -> ReferenceValue {
    // A string template is always a valid single-argument Sub.
    ReferenceValue::Intrinsic(Intrinsic::sub_unchecked(template.into()))
}

/// `Fn::Sub` with a variable map.
pub fn sub_with<K: Into<String>>(
    template: impl Into<String>,
    variables: impl IntoIterator<Item = (K, ReferenceValue)>,
) -> Result<ReferenceValue> {
    intrinsic(
        IntrinsicKind::Sub,
        vec![ReferenceValue::from(template.into()), ReferenceValue::map(variables)],
    )
}

/// `Fn::Join` of `values` with `delimiter`.
pub fn join(delimiter: &str, values: Vec<ReferenceValue>) -> Result<ReferenceValue> {
    intrinsic(IntrinsicKind::Join, vec![delimiter.into(), ReferenceValue::List(values)])
}

/// `Fn::If` on a named condition.
pub fn if_(
    condition_name: impl Into<String>,
    then: ReferenceValue,
    otherwise: ReferenceValue,
) -> Result<ReferenceValue> {
    intrinsic(IntrinsicKind::If, vec![condition(condition_name), then, otherwise])
}

/// `Fn::Select` of `index` from `list`.
pub fn select(index: i64, list: ReferenceValue) -> Result<ReferenceValue> {
    intrinsic(IntrinsicKind::Select, vec![index.into(), list])
}
