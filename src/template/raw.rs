//! Format-independent raw document tree.
//!
//! JSON and YAML are decoded into [`RawNode`] first. YAML short tags are rewritten into
//! their long-form single-key objects here, so normalisation only sees one syntax.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::collections::BTreeMap;
use std::fmt;

use super::DocumentFormat;
use crate::core::{DocumentLocation, Result, StackError};
use crate::refs::IntrinsicKind;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawNode {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Seq(Vec<RawNode>),
    Map(BTreeMap<String, RawNode>),
}

impl RawNode {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Seq(_) => "list",
            Self::Map(_) => "mapping",
        }
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain JSON view, used for opaque sections.
    pub(crate) fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Seq(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => serde_json::Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    fn single(key: impl Into<String>, value: RawNode) -> Self {
        Self::Map(BTreeMap::from([(key.into(), value)]))
    }
}

struct RawNodeVisitor;

impl<'de> Visitor<'de> for RawNodeVisitor {
    type Value = RawNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a template value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<RawNode, E> {
        Ok(RawNode::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<RawNode, E> {
        Ok(RawNode::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<RawNode, E> {
        Ok(RawNode::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<RawNode, E> {
        serde_json::Number::from_f64(v)
            .map(RawNode::Number)
            .ok_or_else(|| E::custom(format!("non-finite number {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<RawNode, E> {
        Ok(RawNode::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<RawNode, E> {
        Ok(RawNode::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<RawNode, E> {
        Ok(RawNode::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<RawNode, E> {
        Ok(RawNode::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<RawNode, D::Error> {
        RawNode::deserialize(d)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<RawNode, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(RawNode::Seq(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<RawNode, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            if entries.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key '{key}'")));
            }
            let value = map.next_value()?;
            entries.insert(key, value);
        }
        Ok(RawNode::Map(entries))
    }
}

impl<'de> Deserialize<'de> for RawNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(RawNodeVisitor)
    }
}

/// Decode a document into a raw tree.
pub(crate) fn decode(bytes: &[u8], format: DocumentFormat) -> Result<RawNode> {
    match format {
        DocumentFormat::Json => serde_json::from_slice::<RawNode>(bytes).map_err(|e| {
            StackError::Parse {
                location: DocumentLocation::at_line(e.line(), e.column()),
                message: e.to_string(),
            }
        }),
        DocumentFormat::Yaml => {
            let value = serde_yaml::from_slice::<serde_yaml::Value>(bytes).map_err(|e| {
                let location = e
                    .location()
                    .map(|loc| DocumentLocation::at_line(loc.line(), loc.column()))
                    .unwrap_or_default();
                StackError::Parse {
                    location,
                    message: e.to_string(),
                }
            })?;
            from_yaml(value, "")
        }
    }
}

fn yaml_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn yaml_key(key: serde_yaml::Value, path: &str) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(StackError::parse(path, format!("unsupported mapping key {other:?}"))),
    }
}

fn yaml_number(n: &serde_yaml::Number, path: &str) -> Result<serde_json::Number> {
    if let Some(i) = n.as_i64() {
        return Ok(i.into());
    }
    if let Some(u) = n.as_u64() {
        return Ok(u.into());
    }
    n.as_f64()
        .and_then(serde_json::Number::from_f64)
        .ok_or_else(|| StackError::parse(path, format!("non-finite number {n}")))
}

fn from_yaml(value: serde_yaml::Value, path: &str) -> Result<RawNode> {
    match value {
        serde_yaml::Value::Null => Ok(RawNode::Null),
        serde_yaml::Value::Bool(b) => Ok(RawNode::Bool(b)),
        serde_yaml::Value::Number(n) => yaml_number(&n, path).map(RawNode::Number),
        serde_yaml::Value::String(s) => Ok(RawNode::String(s)),
        serde_yaml::Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| from_yaml(item, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(RawNode::Seq),
        serde_yaml::Value::Mapping(mapping) => {
            let mut entries = BTreeMap::new();
            for (key, item) in mapping {
                let key = yaml_key(key, path)?;
                let child = from_yaml(item, &yaml_path(path, &key))?;
                if entries.insert(key.clone(), child).is_some() {
                    return Err(StackError::parse(path, format!("duplicate key '{key}'")));
                }
            }
            Ok(RawNode::Map(entries))
        }
        serde_yaml::Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let name = tag.trim_start_matches('!');
            let inner = from_yaml(tagged.value, path)?;
            expand_short_tag(name, inner, path)
        }
    }
}

/// Rewrite a YAML short tag into its long-form object.
fn expand_short_tag(name: &str, value: RawNode, path: &str) -> Result<RawNode> {
    let key = match name {
        "Ref" => "Ref".to_string(),
        "Condition" => "Condition".to_string(),
        "GetAtt" => "Fn::GetAtt".to_string(),
        other => match IntrinsicKind::from_short_name(other) {
            Some(kind) => kind.wire_name(),
            None => {
                let context = if path.is_empty() {
                    "<root>".to_string()
                } else {
                    path.to_string()
                };
                return Err(StackError::UnsupportedIntrinsic {
                    tag: format!("!{name}"),
                    context,
                });
            }
        },
    };
    Ok(RawNode::single(key, value))
}
