//! Template parsing and IR normalisation
//!
//! [`parse`] decodes a JSON or YAML document and normalises it into a [`Template`]:
//!
//! 1. Decode into a raw tree (duplicate keys rejected, YAML short tags expanded)
//! 2. Check top-level sections and reject non-template documents
//! 3. Normalise every value into a [`ReferenceValue`] tree
//!
//! Parsing never resolves references; scope checks happen when the dependency graph is
//! built. Any structural problem aborts the whole document.

use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::raw::{RawNode, decode};
use super::{
    DocumentFormat, Mappings, Output, Parameter, Resource, ResourceBuilder, Template,
    DeletionPolicy,
};
use crate::core::{Result, StackError};
use crate::refs::{Intrinsic, IntrinsicKind, ReferenceValue, Scalar};

/// Top-level sections a template may contain.
pub const KNOWN_SECTIONS: [&str; 10] = [
    "AWSTemplateFormatVersion",
    "Description",
    "Metadata",
    "Parameters",
    "Rules",
    "Mappings",
    "Conditions",
    "Transform",
    "Resources",
    "Outputs",
];

/// Attributes a resource entry may carry.
pub const RESOURCE_ATTRIBUTES: [&str; 9] = [
    "Type",
    "Properties",
    "DependsOn",
    "Condition",
    "DeletionPolicy",
    "UpdateReplacePolicy",
    "Metadata",
    "CreationPolicy",
    "UpdatePolicy",
];

const FOR_EACH_PREFIX: &str = "Fn::ForEach::";

/// Parse a template document into the IR.
///
/// # Errors
///
/// - [`StackError::Parse`] for syntax errors, duplicate keys or logical ids, unknown
///   sections or resource attributes, resources without a `Type`, and mis-shaped values
/// - [`StackError::UnsupportedIntrinsic`] for `Fn::` keys or YAML tags outside the
///   supported set
/// - [`StackError::InvalidIntrinsic`] for intrinsics with the wrong arguments
pub fn parse(bytes: &[u8], format: DocumentFormat) -> Result<Template> {
    debug!("Parsing {} template ({} bytes)", format, bytes.len());

    let root = decode(bytes, format)?;
    let RawNode::Map(sections) = root else {
        return Err(StackError::parse(
            "",
            format!("template must be a mapping, found {}", root.kind_name()),
        ));
    };

    if sections.contains_key("apiVersion") && sections.contains_key("kind") {
        return Err(StackError::parse(
            "",
            "document looks like a Kubernetes manifest (apiVersion/kind), not an infrastructure template",
        ));
    }

    if let Some(unknown) = sections.keys().find(|k| !KNOWN_SECTIONS.contains(&k.as_str())) {
        return Err(StackError::parse(
            unknown.as_str(),
            format!("unknown top-level section '{unknown}'"),
        ));
    }

    let mut template = Template::new();

    for (section, node) in sections {
        match section.as_str() {
            "AWSTemplateFormatVersion" => {
                template.format_version = match node {
                    RawNode::String(s) => s,
                    RawNode::Number(n) => n.to_string(),
                    other => {
                        return Err(expected(&section, "a string", &other));
                    }
                };
            }
            "Description" => {
                template.description = Some(expect_string(node, &section)?);
            }
            "Metadata" => template.metadata = Some(node.to_json()),
            "Transform" => template.transform = Some(node.to_json()),
            "Rules" => template.rules = Some(node.to_json()),
            "Parameters" => template.parameters = parse_parameters(node)?,
            "Mappings" => template.mappings = parse_mappings(node)?,
            "Conditions" => {
                for (name, value) in expect_map(node, &section)? {
                    let path = format!("Conditions.{name}");
                    let value = normalize_value(value, &path)?;
                    template.conditions.insert(name, value);
                }
            }
            "Resources" => {
                for (logical_id, entry) in expect_map(node, &section)? {
                    if logical_id.starts_with(FOR_EACH_PREFIX) {
                        warn!("Skipping unsupported loop '{}' in Resources", logical_id);
                        continue;
                    }
                    let resource = parse_resource(&logical_id, entry)?;
                    template.resources.insert(logical_id, resource);
                }
            }
            "Outputs" => {
                for (logical_id, entry) in expect_map(node, &section)? {
                    if logical_id.starts_with(FOR_EACH_PREFIX) {
                        warn!("Skipping unsupported loop '{}' in Outputs", logical_id);
                        continue;
                    }
                    let output = parse_output(&logical_id, entry)?;
                    template.outputs.insert(logical_id, output);
                }
            }
            _ => {}
        }
    }

    check_namespaces(&template)?;

    debug!(
        "Parsed template: {} resource(s), {} parameter(s), {} condition(s), {} output(s)",
        template.resources.len(),
        template.parameters.len(),
        template.conditions.len(),
        template.outputs.len()
    );

    Ok(template)
}

/// Parameters, conditions and resources share one logical id namespace.
fn check_namespaces(template: &Template) -> Result<()> {
    let namespaces = [
        ("Parameters", "parameter", template.parameters.keys().collect::<Vec<_>>()),
        ("Conditions", "condition", template.conditions.keys().collect()),
        ("Resources", "resource", template.resources.keys().collect()),
    ];
    for (i, (_, first_kind, first_ids)) in namespaces.iter().enumerate() {
        for (section, second_kind, second_ids) in &namespaces[i + 1..] {
            if let Some(id) = first_ids.iter().find(|id| second_ids.contains(*id)) {
                return Err(StackError::parse(
                    format!("{section}.{id}"),
                    format!("duplicate logical id '{id}' is declared as both a {first_kind} and a {second_kind}"),
                ));
            }
        }
    }
    Ok(())
}

fn expected(path: &str, what: &str, found: &RawNode) -> StackError {
    StackError::parse(path, format!("expected {what}, found {}", found.kind_name()))
}

fn expect_map(node: RawNode, path: &str) -> Result<BTreeMap<String, RawNode>> {
    match node {
        RawNode::Map(entries) => Ok(entries),
        RawNode::Null => Ok(BTreeMap::new()),
        other => Err(expected(path, "a mapping", &other)),
    }
}

fn expect_string(node: RawNode, path: &str) -> Result<String> {
    match node {
        RawNode::String(s) => Ok(s),
        other => Err(expected(path, "a string", &other)),
    }
}

fn parse_parameters(node: RawNode) -> Result<BTreeMap<String, Parameter>> {
    let mut parameters = BTreeMap::new();
    for (logical_id, entry) in expect_map(node, "Parameters")? {
        let path = format!("Parameters.{logical_id}");
        if !matches!(entry, RawNode::Map(_)) {
            return Err(expected(&path, "a mapping", &entry));
        }
        let mut parameter: Parameter = serde_json::from_value(entry.to_json())
            .map_err(|e| StackError::parse(&path, e.to_string()))?;
        parameter.logical_id.clone_from(&logical_id);
        parameters.insert(logical_id, parameter);
    }
    Ok(parameters)
}

fn parse_mappings(node: RawNode) -> Result<Mappings> {
    let mut mappings = Mappings::new();
    for (name, top) in expect_map(node, "Mappings")? {
        let mut top_level = BTreeMap::new();
        for (top_key, second) in expect_map(top, &format!("Mappings.{name}"))? {
            let path = format!("Mappings.{name}.{top_key}");
            let second_level = expect_map(second, &path)?
                .into_iter()
                .map(|(key, value)| (key, value.to_json()))
                .collect();
            top_level.insert(top_key, second_level);
        }
        mappings.insert(name, top_level);
    }
    Ok(mappings)
}

fn parse_policy(node: RawNode, path: &str) -> Result<DeletionPolicy> {
    expect_string(node, path)?
        .parse()
        .map_err(|e: StackError| StackError::parse(path, e.to_string()))
}

fn parse_resource(logical_id: &str, node: RawNode) -> Result<Resource> {
    let path = format!("Resources.{logical_id}");
    let mut attributes = match node {
        RawNode::Map(entries) => entries,
        other => return Err(expected(&path, "a mapping", &other)),
    };

    if let Some(unknown) = attributes.keys().find(|k| !RESOURCE_ATTRIBUTES.contains(&k.as_str())) {
        return Err(StackError::parse(
            format!("{path}.{unknown}"),
            format!("unknown resource attribute '{unknown}'"),
        ));
    }

    let type_name = match attributes.remove("Type") {
        Some(node) => expect_string(node, &format!("{path}.Type"))?,
        None => {
            return Err(StackError::parse(&path, format!("resource '{logical_id}' is missing a Type")));
        }
    };

    let mut builder: ResourceBuilder = Resource::builder(logical_id, type_name);

    for (attribute, node) in attributes {
        let attr_path = format!("{path}.{attribute}");
        builder = match attribute.as_str() {
            "Properties" => {
                let mut properties = Vec::new();
                for (name, value) in expect_map(node, &attr_path)? {
                    let value = normalize_value(value, &format!("{attr_path}.{name}"))?;
                    properties.push((name, value));
                }
                builder.properties(properties)
            }
            "DependsOn" => match node {
                RawNode::String(target) => builder.depends_on(target),
                RawNode::Seq(items) => {
                    let mut builder = builder;
                    for (i, item) in items.into_iter().enumerate() {
                        builder = builder.depends_on(expect_string(item, &format!("{attr_path}[{i}]"))?);
                    }
                    builder
                }
                other => return Err(expected(&attr_path, "a string or list of strings", &other)),
            },
            "Condition" => builder.condition(expect_string(node, &attr_path)?),
            "DeletionPolicy" => builder.deletion_policy(parse_policy(node, &attr_path)?),
            "UpdateReplacePolicy" => builder.update_replace_policy(parse_policy(node, &attr_path)?),
            "Metadata" => builder.metadata(node.to_json()),
            "CreationPolicy" => builder.creation_policy(node.to_json()),
            "UpdatePolicy" => builder.update_policy(node.to_json()),
            _ => builder,
        };
    }

    Ok(builder.build())
}

fn parse_output(logical_id: &str, node: RawNode) -> Result<Output> {
    let path = format!("Outputs.{logical_id}");
    let mut entries = match node {
        RawNode::Map(entries) => entries,
        other => return Err(expected(&path, "a mapping", &other)),
    };

    let value = match entries.remove("Value") {
        Some(value) => normalize_value(value, &format!("{path}.Value"))?,
        None => return Err(StackError::parse(&path, format!("output '{logical_id}' is missing a Value"))),
    };
    let mut output = Output::new(logical_id, value);

    for (key, node) in entries {
        let key_path = format!("{path}.{key}");
        match key.as_str() {
            "Description" => output.description = Some(expect_string(node, &key_path)?),
            "Condition" => output.condition = Some(expect_string(node, &key_path)?),
            "Export" => {
                let mut export = expect_map(node, &key_path)?;
                let name = export
                    .remove("Name")
                    .ok_or_else(|| StackError::parse(&key_path, "export is missing a Name"))?;
                output.export_name = Some(normalize_value(name, &format!("{key_path}.Name"))?);
            }
            other => {
                return Err(StackError::parse(&key_path, format!("unknown output attribute '{other}'")));
            }
        }
    }

    Ok(output)
}

/// Normalise a raw value into a [`ReferenceValue`] tree.
fn normalize_value(node: RawNode, path: &str) -> Result<ReferenceValue> {
    match node {
        RawNode::Null => Ok(ReferenceValue::null()),
        RawNode::Bool(b) => Ok(ReferenceValue::Literal(Scalar::Bool(b))),
        RawNode::Number(n) => Ok(ReferenceValue::Literal(Scalar::Number(n))),
        RawNode::String(s) => Ok(ReferenceValue::Literal(Scalar::String(s))),
        RawNode::Seq(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| normalize_value(item, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(ReferenceValue::List),
        RawNode::Map(mut entries) => {
            if entries.len() == 1
                && let Some((key, _)) = entries.first_key_value()
                && is_intrinsic_key(key, entries.values().next())
            {
                let key = key.clone();
                if let Some(value) = entries.remove(&key) {
                    return normalize_intrinsic(&key, value, path);
                }
            }
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                let child = normalize_value(value, &format!("{path}.{key}"))?;
                map.insert(key, child);
            }
            Ok(ReferenceValue::Map(map))
        }
    }
}

fn is_intrinsic_key(key: &str, value: Option<&RawNode>) -> bool {
    match key {
        "Ref" | "Fn::GetAtt" => true,
        // IAM policy statements use a `Condition` key holding a mapping.
        "Condition" => matches!(value, Some(RawNode::String(_))),
        _ => key.starts_with("Fn::"),
    }
}

fn normalize_intrinsic(key: &str, value: RawNode, path: &str) -> Result<ReferenceValue> {
    let path = format!("{path}.{key}");
    match key {
        "Ref" => Ok(ReferenceValue::Ref(expect_string(value, &path)?)),
        "Condition" => Ok(ReferenceValue::ConditionRef(expect_string(value, &path)?)),
        "Fn::GetAtt" => normalize_get_att(value, &path),
        _ => {
            let kind = IntrinsicKind::from_wire_name(key).ok_or_else(|| {
                StackError::UnsupportedIntrinsic {
                    tag: key.to_string(),
                    context: path.clone(),
                }
            })?;

            let args = match value {
                RawNode::Seq(items) if !kind.is_unary_on_wire() => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| normalize_value(item, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>>>()?,
                other if kind.is_unary_on_wire() || kind == IntrinsicKind::Sub => {
                    vec![normalize_value(other, &path)?]
                }
                other => return Err(expected(&path, "a list of arguments", &other)),
            };

            let args = match kind {
                IntrinsicKind::If => condition_name_first(args),
                _ => args,
            };

            Intrinsic::new(kind, args).map(ReferenceValue::Intrinsic).map_err(|e| match e {
                StackError::InvalidIntrinsic {
                    kind,
                    reason,
                } => StackError::InvalidIntrinsic {
                    kind,
                    reason: format!("{reason} at {path}"),
                },
                other => other,
            })
        }
    }
}

// `Fn::If` names its condition with a bare string on the wire.
fn condition_name_first(mut args: Vec<ReferenceValue>) -> Vec<ReferenceValue> {
    if let Some(first) = args.first_mut()
        && let Some(name) = first.as_str()
    {
        *first = ReferenceValue::ConditionRef(name.to_string());
    }
    args
}

fn normalize_get_att(value: RawNode, path: &str) -> Result<ReferenceValue> {
    let (target, attribute) = match value {
        RawNode::String(s) => match s.split_once('.') {
            Some((target, attribute)) if !target.is_empty() && !attribute.is_empty() => {
                (target.to_string(), attribute.to_string())
            }
            _ => {
                return Err(StackError::parse(path, format!("expected 'Resource.Attribute', found '{s}'")));
            }
        },
        RawNode::Seq(items) if items.len() == 2 => {
            let mut items = items.into_iter();
            let target = items.next().unwrap_or(RawNode::Null);
            let attribute = items.next().unwrap_or(RawNode::Null);
            let target = expect_string(target, &format!("{path}[0]"))?;
            let attribute = match attribute {
                RawNode::String(s) => s,
                other => {
                    return Err(StackError::parse(
                        format!("{path}[1]"),
                        format!("attribute name must be a literal string, found {}", other.kind_name()),
                    ));
                }
            };
            (target, attribute)
        }
        other => return Err(expected(path, "'Resource.Attribute' or [Resource, Attribute]", &other)),
    };

    Ok(ReferenceValue::Attr {
        target,
        attribute,
    })
}
