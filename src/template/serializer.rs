//! IR to document serialization
//!
//! A [`WireSyntax`] decides how each [`ReferenceValue`] node is written. The serializer
//! walks resources in a caller-supplied order and emits every optional resource
//! attribute only when it is present, so serializing the same input twice yields
//! byte-identical output.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use super::{Output, Resource, ResourceSet, Template};
use crate::core::{Result, StackError};
use crate::graph::{GraphBuilder, creation_order};
use crate::refs::{IntrinsicKind, LogicalId, ReferenceValue, Scalar};

/// Per-format reference syntax.
///
/// Implementors decide how references and intrinsic nodes look on the wire; the provided
/// [`WireSyntax::value`] and [`WireSyntax::resource`] walk the IR and call them.
pub trait WireSyntax {
    /// Reference by id.
    fn reference(&self, target: &str) -> Value;

    /// Attribute lookup.
    fn attribute(&self, target: &str, attribute: &str) -> Value;

    /// Reference to a named condition.
    fn condition(&self, name: &str) -> Value;

    /// Intrinsic node with already-serialized arguments.
    fn intrinsic(&self, kind: IntrinsicKind, args: Vec<Value>) -> Value;

    /// Serialize a value tree.
    fn value(&self, value: &ReferenceValue) -> Value {
        match value {
            ReferenceValue::Literal(scalar) => match scalar {
                Scalar::Null => Value::Null,
                Scalar::Bool(b) => Value::Bool(*b),
                Scalar::Number(n) => Value::Number(n.clone()),
                Scalar::String(s) => Value::String(s.clone()),
            },
            ReferenceValue::List(items) => Value::Array(items.iter().map(|v| self.value(v)).collect()),
            ReferenceValue::Map(entries) => Value::Object(
                entries.iter().map(|(k, v)| (k.clone(), self.value(v))).collect(),
            ),
            ReferenceValue::Ref(target) => self.reference(target),
            ReferenceValue::Attr {
                target,
                attribute,
            } => self.attribute(target, attribute),
            ReferenceValue::ConditionRef(name) => self.condition(name),
            ReferenceValue::Intrinsic(intrinsic) => {
                let args = intrinsic
                    .args()
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| match (intrinsic.kind(), arg) {
                        (IntrinsicKind::If, ReferenceValue::ConditionRef(name)) if i == 0 => {
                            Value::String(name.clone())
                        }
                        _ => self.value(arg),
                    })
                    .collect();
                self.intrinsic(intrinsic.kind(), args)
            }
        }
    }

    /// Serialize one resource entry. Absent attributes are omitted.
    fn resource(&self, resource: &Resource) -> Value {
        let mut entry = Map::new();
        entry.insert("Type".to_string(), Value::String(resource.type_name().to_string()));

        if !resource.properties().is_empty() {
            let properties = resource
                .properties()
                .iter()
                .map(|(name, value)| (name.clone(), self.value(value)))
                .collect();
            entry.insert("Properties".to_string(), Value::Object(properties));
        }
        if !resource.depends_on().is_empty() {
            let targets = resource.depends_on().iter().cloned().map(Value::String).collect();
            entry.insert("DependsOn".to_string(), Value::Array(targets));
        }
        if let Some(condition) = resource.condition() {
            entry.insert("Condition".to_string(), Value::String(condition.to_string()));
        }
        if let Some(policy) = resource.deletion_policy() {
            entry.insert("DeletionPolicy".to_string(), Value::String(policy.as_str().to_string()));
        }
        if let Some(policy) = resource.update_replace_policy() {
            entry.insert("UpdateReplacePolicy".to_string(), Value::String(policy.as_str().to_string()));
        }
        if let Some(policy) = resource.creation_policy() {
            entry.insert("CreationPolicy".to_string(), policy.clone());
        }
        if let Some(policy) = resource.update_policy() {
            entry.insert("UpdatePolicy".to_string(), policy.clone());
        }
        if let Some(metadata) = resource.metadata() {
            entry.insert("Metadata".to_string(), metadata.clone());
        }

        Value::Object(entry)
    }
}

/// Long-form CloudFormation syntax (`{"Ref": ..}`, `{"Fn::GetAtt": [..]}`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudFormationSyntax;

fn single(key: impl Into<String>, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.into(), value);
    Value::Object(map)
}

impl WireSyntax for CloudFormationSyntax {
    fn reference(&self, target: &str) -> Value {
        single("Ref", Value::String(target.to_string()))
    }

    fn attribute(&self, target: &str, attribute: &str) -> Value {
        single(
            "Fn::GetAtt",
            Value::Array(vec![Value::String(target.to_string()), Value::String(attribute.to_string())]),
        )
    }

    fn condition(&self, name: &str) -> Value {
        single("Condition", Value::String(name.to_string()))
    }

    fn intrinsic(&self, kind: IntrinsicKind, mut args: Vec<Value>) -> Value {
        let body = if kind.is_unary_on_wire() || (kind == IntrinsicKind::Sub && args.len() == 1) {
            args.pop().unwrap_or(Value::Null)
        } else {
            Value::Array(args)
        };
        single(kind.wire_name(), body)
    }
}

/// A serialized template document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    value: Value,
}

impl Document {
    pub fn new(value: Value) -> Self {
        Self {
            value,
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Resource ids in document order.
    pub fn resource_ids(&self) -> Vec<&str> {
        self.value
            .get("Resources")
            .and_then(Value::as_object)
            .map(|resources| resources.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.value)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.value)?)
    }

    /// Raw bytes of the document in `format`.
    pub fn to_bytes(&self, format: super::DocumentFormat) -> Result<Vec<u8>> {
        match format {
            super::DocumentFormat::Json => Ok(serde_json::to_vec_pretty(&self.value)?),
            super::DocumentFormat::Yaml => self.to_yaml().map(String::into_bytes),
        }
    }

    /// `sha256:<hex>` digest of the compact JSON encoding.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.value.to_string().as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }
}

fn check_permutation(resources: &ResourceSet, order: &[LogicalId]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in order {
        if !resources.contains_key(id) {
            return Err(StackError::InvalidOrder {
                reason: format!("'{id}' is not in the resource set"),
            });
        }
        if !seen.insert(id.as_str()) {
            return Err(StackError::InvalidOrder {
                reason: format!("'{id}' appears more than once"),
            });
        }
    }
    if let Some(missing) = resources.keys().find(|id| !seen.contains(id.as_str())) {
        return Err(StackError::InvalidOrder {
            reason: format!("'{missing}' is missing from the order"),
        });
    }
    Ok(())
}

fn resources_section(syntax: &impl WireSyntax, resources: &ResourceSet, order: &[LogicalId]) -> Value {
    let mut section = Map::new();
    for id in order {
        if let Some(resource) = resources.get(id) {
            section.insert(id.clone(), syntax.resource(resource));
        }
    }
    Value::Object(section)
}

/// Serialize `resources` in `order` with an explicit syntax.
///
/// # Errors
///
/// Returns [`StackError::InvalidOrder`] unless `order` is a permutation of the resource
/// ids.
pub fn to_document_with(
    syntax: &impl WireSyntax,
    resources: &ResourceSet,
    order: &[LogicalId],
) -> Result<Document> {
    check_permutation(resources, order)?;

    let mut root = Map::new();
    root.insert(
        "AWSTemplateFormatVersion".to_string(),
        Value::String(super::DEFAULT_FORMAT_VERSION.to_string()),
    );
    root.insert("Resources".to_string(), resources_section(syntax, resources, order));
    Ok(Document::new(Value::Object(root)))
}

/// Serialize `resources` in `order` as a CloudFormation document.
pub fn to_document(resources: &ResourceSet, order: &[LogicalId]) -> Result<Document> {
    to_document_with(&CloudFormationSyntax, resources, order)
}

fn output_entry(syntax: &impl WireSyntax, output: &Output) -> Value {
    let mut entry = Map::new();
    if let Some(description) = &output.description {
        entry.insert("Description".to_string(), Value::String(description.clone()));
    }
    entry.insert("Value".to_string(), syntax.value(&output.value));
    if let Some(name) = &output.export_name {
        entry.insert("Export".to_string(), single("Name", syntax.value(name)));
    }
    if let Some(condition) = &output.condition {
        entry.insert("Condition".to_string(), Value::String(condition.clone()));
    }
    Value::Object(entry)
}

impl Template {
    /// Serialize the whole template, resources in creation order.
    ///
    /// # Errors
    ///
    /// Fails like [`GraphBuilder::for_template`] and [`creation_order`]: unresolved
    /// references and cycles prevent a creation order from existing.
    pub fn to_document(&self) -> Result<Document> {
        self.to_document_with(&CloudFormationSyntax)
    }

    /// Serialize the whole template with an explicit syntax.
    pub fn to_document_with(&self, syntax: &impl WireSyntax) -> Result<Document> {
        let graph = GraphBuilder::for_template(self).build()?;
        let order = creation_order(&graph)?;

        let mut root = Map::new();
        root.insert("AWSTemplateFormatVersion".to_string(), Value::String(self.format_version.clone()));
        if let Some(description) = &self.description {
            root.insert("Description".to_string(), Value::String(description.clone()));
        }
        if let Some(metadata) = &self.metadata {
            root.insert("Metadata".to_string(), metadata.clone());
        }
        if let Some(transform) = &self.transform {
            root.insert("Transform".to_string(), transform.clone());
        }
        if !self.parameters.is_empty() {
            let parameters = self
                .parameters
                .iter()
                .map(|(id, parameter)| Ok((id.clone(), serde_json::to_value(parameter)?)))
                .collect::<Result<Map<_, _>>>()?;
            root.insert("Parameters".to_string(), Value::Object(parameters));
        }
        if let Some(rules) = &self.rules {
            root.insert("Rules".to_string(), rules.clone());
        }
        if !self.mappings.is_empty() {
            root.insert("Mappings".to_string(), serde_json::to_value(&self.mappings)?);
        }
        if !self.conditions.is_empty() {
            let conditions =
                self.conditions.iter().map(|(name, value)| (name.clone(), syntax.value(value))).collect();
            root.insert("Conditions".to_string(), Value::Object(conditions));
        }
        if !self.resources.is_empty() {
            root.insert("Resources".to_string(), resources_section(syntax, &self.resources, &order));
        }
        if !self.outputs.is_empty() {
            let outputs =
                self.outputs.iter().map(|(id, output)| (id.clone(), output_entry(syntax, output))).collect();
            root.insert("Outputs".to_string(), Value::Object(outputs));
        }

        Ok(Document::new(Value::Object(root)))
    }
}
