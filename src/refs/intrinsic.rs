//! Intrinsic function nodes and their argument shapes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ReferenceValue;
use crate::core::{Result, StackError};

/// The fixed set of computed-value operations a template may contain.
///
/// `Ref`, `Fn::GetAtt` and `Condition` are not listed here; they are dedicated
/// [`ReferenceValue`] variants because they name other logical ids directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntrinsicKind {
    Join,
    Select,
    Sub,
    If,
    Equals,
    And,
    Or,
    Not,
    Base64,
    #[serde(rename = "getAZs")]
    GetAzs,
    ImportValue,
    FindInMap,
    Split,
    Transform,
    Cidr,
}

impl IntrinsicKind {
    /// Every supported kind, in declaration order.
    pub const ALL: [IntrinsicKind; 15] = [
        Self::Join,
        Self::Select,
        Self::Sub,
        Self::If,
        Self::Equals,
        Self::And,
        Self::Or,
        Self::Not,
        Self::Base64,
        Self::GetAzs,
        Self::ImportValue,
        Self::FindInMap,
        Self::Split,
        Self::Transform,
        Self::Cidr,
    ];

    /// The short name used in YAML tags (`Join` for `!Join`).
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Join => "Join",
            Self::Select => "Select",
            Self::Sub => "Sub",
            Self::If => "If",
            Self::Equals => "Equals",
            Self::And => "And",
            Self::Or => "Or",
            Self::Not => "Not",
            Self::Base64 => "Base64",
            Self::GetAzs => "GetAZs",
            Self::ImportValue => "ImportValue",
            Self::FindInMap => "FindInMap",
            Self::Split => "Split",
            Self::Transform => "Transform",
            Self::Cidr => "Cidr",
        }
    }

    /// The long-form object key (`Fn::Join`).
    pub fn wire_name(self) -> String {
        format!("Fn::{}", self.short_name())
    }

    /// Look up a kind by its long-form key.
    pub fn from_wire_name(key: &str) -> Option<Self> {
        key.strip_prefix("Fn::").and_then(Self::from_short_name)
    }

    /// Look up a kind by its short name.
    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.short_name() == name)
    }

    /// Inclusive bounds on the argument count.
    pub const fn arity(self) -> (usize, usize) {
        match self {
            Self::Not
            | Self::Base64
            | Self::GetAzs
            | Self::ImportValue
            | Self::Transform => (1, 1),
            Self::Sub => (1, 2),
            Self::Join | Self::Select | Self::Equals | Self::Split => (2, 2),
            Self::And | Self::Or => (2, 10),
            Self::If | Self::FindInMap | Self::Cidr => (3, 3),
        }
    }

    /// Whether the wire form is a bare value rather than an argument list.
    ///
    /// `Fn::Not` is single-argument but is written as a one-element list.
    pub const fn is_unary_on_wire(self) -> bool {
        matches!(self, Self::Base64 | Self::GetAzs | Self::ImportValue | Self::Transform)
    }
}

impl fmt::Display for IntrinsicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fn::{}", self.short_name())
    }
}

/// A validated intrinsic function node.
///
/// Construction goes through [`Intrinsic::new`], which rejects arguments of the wrong
/// arity or shape, so every `Intrinsic` reachable from a [`ReferenceValue`] is well
/// formed and traversal never has to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intrinsic {
    kind: IntrinsicKind,
    args: Vec<ReferenceValue>,
}

impl Intrinsic {
    /// Build an intrinsic node, validating the argument list for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::InvalidIntrinsic`] when the argument count is outside
    /// [`IntrinsicKind::arity`] or an argument has the wrong shape:
    /// - `Fn::Join` / `Fn::Split` need a string delimiter first
    /// - `Fn::Sub` needs a string template, optionally followed by a variable map
    /// - `Fn::If` needs a condition reference first
    /// - `Fn::Transform` needs a map with a `Name` entry
    pub fn new(kind: IntrinsicKind, args: Vec<ReferenceValue>) -> Result<Self> {
        let (min, max) = kind.arity();
        if args.len() < min || args.len() > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            return Err(StackError::InvalidIntrinsic {
                kind,
                reason: format!("expected {expected} argument(s), found {}", args.len()),
            });
        }

        let invalid = |reason: &str| StackError::InvalidIntrinsic {
            kind,
            reason: reason.to_string(),
        };

        match kind {
            IntrinsicKind::Join | IntrinsicKind::Split => {
                if args[0].as_str().is_none() {
                    return Err(invalid("delimiter must be a string"));
                }
            }
            IntrinsicKind::Sub => {
                if args[0].as_str().is_none() {
                    return Err(invalid("template must be a string"));
                }
                if let Some(vars) = args.get(1)
                    && !matches!(vars, ReferenceValue::Map(_))
                {
                    return Err(invalid("variables must be a map"));
                }
            }
            IntrinsicKind::If => {
                if !matches!(args[0], ReferenceValue::ConditionRef(_)) {
                    return Err(invalid("first argument must name a condition"));
                }
            }
            IntrinsicKind::Transform => match &args[0] {
                ReferenceValue::Map(entries) if entries.contains_key("Name") => {}
                _ => return Err(invalid("argument must be a map with a Name entry")),
            },
            _ => {}
        }

        Ok(Self {
            kind,
            args,
        })
    }

    pub(crate) fn sub_unchecked(template: String) -> Self {
        Self {
            kind: IntrinsicKind::Sub,
            args: vec![ReferenceValue::from(template)],
        }
    }

    /// The operation.
    pub fn kind(&self) -> IntrinsicKind {
        self.kind
    }

    /// The validated arguments.
    pub fn args(&self) -> &[ReferenceValue] {
        &self.args
    }

    /// The template string of a `Fn::Sub`.
    pub fn sub_template(&self) -> Option<&str> {
        match self.kind {
            IntrinsicKind::Sub => self.args[0].as_str(),
            _ => None,
        }
    }

    /// The variable map of a two-argument `Fn::Sub`.
    pub fn sub_variables(&self) -> Option<&BTreeMap<String, ReferenceValue>> {
        match (self.kind, self.args.get(1)) {
            (IntrinsicKind::Sub, Some(ReferenceValue::Map(vars))) => Some(vars),
            _ => None,
        }
    }

    /// The condition named by a `Fn::If`.
    pub fn if_condition(&self) -> Option<&str> {
        match (self.kind, &self.args[0]) {
            (IntrinsicKind::If, ReferenceValue::ConditionRef(name)) => Some(name),
            _ => None,
        }
    }
}
