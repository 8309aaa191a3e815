//! Template intermediate representation
//!
//! The IR is format independent: both JSON and YAML documents parse into the same
//! [`Template`], and [`Template::to_document`] writes it back out. Resources are
//! immutable once built; use [`Resource::builder`] to construct one.
//!
//! # Submodules
//!
//! - [`parser`] - Document decoding and normalisation into the IR
//! - [`serializer`] - IR to document conversion through a [`WireSyntax`]
//!
//! # Example
//!
//! ```rust
//! use stackgraph::refs;
//! use stackgraph::template::{DocumentFormat, Resource, Template};
//!
//! let subnet = Resource::builder("Subnet", "AWS::EC2::Subnet")
//!     .property("VpcId", refs::reference("Network"))
//!     .build();
//! assert_eq!(subnet.service(), "EC2");
//! assert_eq!(subnet.short_type(), "Subnet");
//!
//! let template = Template::parse(
//!     br#"{"Resources": {"Network": {"Type": "AWS::EC2::VPC"}}}"#,
//!     DocumentFormat::Json,
//! )
//! .unwrap();
//! assert!(template.resources.contains_key("Network"));
//! ```

pub mod parser;
mod raw;
pub mod serializer;

pub use parser::parse;
pub use serializer::{CloudFormationSyntax, Document, WireSyntax, to_document, to_document_with};

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::{Result, StackError};
use crate::refs::{LogicalId, ReferenceValue};

/// Default `AWSTemplateFormatVersion`.
pub const DEFAULT_FORMAT_VERSION: &str = "2010-09-09";

/// Resources keyed by logical id.
pub type ResourceSet = BTreeMap<LogicalId, Resource>;

/// Mapping sections: map name → top-level key → second-level key → literal value.
pub type Mappings = BTreeMap<String, BTreeMap<String, BTreeMap<String, serde_json::Value>>>;

/// Collect resources into a [`ResourceSet`].
///
/// Later resources replace earlier ones with the same logical id.
pub fn resource_set(resources: impl IntoIterator<Item = Resource>) -> ResourceSet {
    resources.into_iter().map(|r| (r.logical_id().to_string(), r)).collect()
}

/// Document encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick a format from the file extension (`.json`, `.yaml`, `.yml`).
    pub fn detect(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Guess the format from document content: JSON documents start with `{`.
    pub fn sniff(bytes: &[u8]) -> Self {
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// What happens to a resource's physical counterpart on deletion or replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    RetainExceptOnCreate,
    Snapshot,
}

impl DeletionPolicy {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "Delete",
            Self::Retain => "Retain",
            Self::RetainExceptOnCreate => "RetainExceptOnCreate",
            Self::Snapshot => "Snapshot",
        }
    }
}

impl FromStr for DeletionPolicy {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Delete" => Ok(Self::Delete),
            "Retain" => Ok(Self::Retain),
            "RetainExceptOnCreate" => Ok(Self::RetainExceptOnCreate),
            "Snapshot" => Ok(Self::Snapshot),
            other => Err(StackError::Other {
                message: format!(
                    "unknown deletion policy '{other}' (expected Delete, Retain, RetainExceptOnCreate or Snapshot)"
                ),
            }),
        }
    }
}

/// A declared resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    logical_id: LogicalId,
    type_name: String,
    properties: BTreeMap<String, ReferenceValue>,
    depends_on: Vec<LogicalId>,
    condition: Option<String>,
    deletion_policy: Option<DeletionPolicy>,
    update_replace_policy: Option<DeletionPolicy>,
    metadata: Option<serde_json::Value>,
    creation_policy: Option<serde_json::Value>,
    update_policy: Option<serde_json::Value>,
}

impl Resource {
    /// Start building a resource.
    pub fn builder(logical_id: impl Into<LogicalId>, type_name: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder {
            resource: Self {
                logical_id: logical_id.into(),
                type_name: type_name.into(),
                properties: BTreeMap::new(),
                depends_on: Vec::new(),
                condition: None,
                deletion_policy: None,
                update_replace_policy: None,
                metadata: None,
                creation_policy: None,
                update_policy: None,
            },
        }
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Provider type, e.g. `AWS::S3::Bucket`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &BTreeMap<String, ReferenceValue> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&ReferenceValue> {
        self.properties.get(name)
    }

    /// Explicit dependencies, in declaration order.
    pub fn depends_on(&self) -> &[LogicalId] {
        &self.depends_on
    }

    /// Name of the condition gating this resource.
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn deletion_policy(&self) -> Option<DeletionPolicy> {
        self.deletion_policy
    }

    pub fn update_replace_policy(&self) -> Option<DeletionPolicy> {
        self.update_replace_policy
    }

    pub fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    pub fn creation_policy(&self) -> Option<&serde_json::Value> {
        self.creation_policy.as_ref()
    }

    pub fn update_policy(&self) -> Option<&serde_json::Value> {
        self.update_policy.as_ref()
    }

    /// Service segment of the type name (`S3` for `AWS::S3::Bucket`).
    pub fn service(&self) -> &str {
        self.type_name.split("::").nth(1).unwrap_or("")
    }

    /// Last segment of the type name (`Bucket` for `AWS::S3::Bucket`).
    pub fn short_type(&self) -> &str {
        self.type_name.rsplit("::").next().unwrap_or(&self.type_name)
    }

    /// A copy of this resource under a different logical id.
    #[must_use]
    pub fn renamed(&self, logical_id: impl Into<LogicalId>) -> Self {
        Self {
            logical_id: logical_id.into(),
            ..self.clone()
        }
    }
}

/// Builder for [`Resource`].
#[derive(Debug, Clone)]
#[must_use]
pub struct ResourceBuilder {
    resource: Resource,
}

impl ResourceBuilder {
    pub fn property(mut self, name: impl Into<String>, value: impl Into<ReferenceValue>) -> Self {
        self.resource.properties.insert(name.into(), value.into());
        self
    }

    pub fn properties(
        mut self,
        properties: impl IntoIterator<Item = (String, ReferenceValue)>,
    ) -> Self {
        self.resource.properties.extend(properties);
        self
    }

    /// Add an explicit dependency. Duplicates are ignored.
    pub fn depends_on(mut self, target: impl Into<LogicalId>) -> Self {
        let target = target.into();
        if !self.resource.depends_on.contains(&target) {
            self.resource.depends_on.push(target);
        }
        self
    }

    pub fn condition(mut self, name: impl Into<String>) -> Self {
        self.resource.condition = Some(name.into());
        self
    }

    pub fn deletion_policy(mut self, policy: DeletionPolicy) -> Self {
        self.resource.deletion_policy = Some(policy);
        self
    }

    pub fn update_replace_policy(mut self, policy: DeletionPolicy) -> Self {
        self.resource.update_replace_policy = Some(policy);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.resource.metadata = Some(metadata);
        self
    }

    pub fn creation_policy(mut self, policy: serde_json::Value) -> Self {
        self.resource.creation_policy = Some(policy);
        self
    }

    pub fn update_policy(mut self, policy: serde_json::Value) -> Self {
        self.resource.update_policy = Some(policy);
        self
    }

    #[must_use]
    pub fn build(self) -> Resource {
        self.resource
    }
}

/// A template parameter.
///
/// Serialized field names follow the template wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Parameter {
    #[serde(skip)]
    pub logical_id: LogicalId,
    #[serde(rename = "Type", default = "default_parameter_type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_pattern: Option<String>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<serde_json::Number>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<serde_json::Number>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<serde_json::Number>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "std::ops::Not::not")]
    pub no_echo: bool,
}

fn default_parameter_type() -> String {
    "String".to_string()
}

impl Parameter {
    /// A `String` parameter with no constraints.
    pub fn new(logical_id: impl Into<LogicalId>) -> Self {
        Self {
            logical_id: logical_id.into(),
            type_name: default_parameter_type(),
            description: None,
            default: None,
            allowed_values: Vec::new(),
            allowed_pattern: None,
            min_length: None,
            max_length: None,
            min_value: None,
            max_value: None,
            constraint_description: None,
            no_echo: false,
        }
    }

    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }
}

// Numeric constraints are frequently written as strings ("MinLength": "1").
fn lenient_number<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Number>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(Some(n)),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<serde_json::Number>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, found '{s}'"))),
        Some(other) => Err(D::Error::custom(format!("expected a number, found {other}"))),
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(b) => Ok(b),
        serde_json::Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        serde_json::Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(D::Error::custom(format!("expected a boolean, found {other}"))),
    }
}

/// A template output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub logical_id: LogicalId,
    pub value: ReferenceValue,
    pub description: Option<String>,
    /// Value of `Export.Name`
    pub export_name: Option<ReferenceValue>,
    pub condition: Option<String>,
}

impl Output {
    pub fn new(logical_id: impl Into<LogicalId>, value: ReferenceValue) -> Self {
        Self {
            logical_id: logical_id.into(),
            value,
            description: None,
            export_name: None,
            condition: None,
        }
    }
}

/// Root aggregate of a parsed or declared template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub format_version: String,
    pub description: Option<String>,
    /// Opaque top-level `Metadata`
    pub metadata: Option<serde_json::Value>,
    /// Opaque top-level `Transform`
    pub transform: Option<serde_json::Value>,
    pub parameters: BTreeMap<LogicalId, Parameter>,
    /// Opaque top-level `Rules`
    pub rules: Option<serde_json::Value>,
    pub mappings: Mappings,
    pub conditions: BTreeMap<String, ReferenceValue>,
    pub resources: ResourceSet,
    pub outputs: BTreeMap<LogicalId, Output>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            format_version: DEFAULT_FORMAT_VERSION.to_string(),
            description: None,
            metadata: None,
            transform: None,
            parameters: BTreeMap::new(),
            rules: None,
            mappings: BTreeMap::new(),
            conditions: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }
}

impl Template {
    /// An empty template with the default format version.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document. See [`parser::parse`].
    pub fn parse(bytes: &[u8], format: DocumentFormat) -> Result<Self> {
        parse(bytes, format)
    }

    /// A template holding exactly `resources`.
    pub fn from_resources(resources: ResourceSet) -> Self {
        Self {
            resources,
            ..Self::default()
        }
    }

    /// Insert or replace a resource.
    pub fn insert_resource(&mut self, resource: Resource) {
        self.resources.insert(resource.logical_id().to_string(), resource);
    }

    /// Insert or replace a parameter.
    pub fn insert_parameter(&mut self, parameter: Parameter) {
        self.parameters.insert(parameter.logical_id.clone(), parameter);
    }

    pub fn resource(&self, logical_id: &str) -> Result<&Resource> {
        self.resources.get(logical_id).ok_or_else(|| StackError::ResourceNotFound {
            logical_id: logical_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs;

    #[test]
    fn test_builder_dedupes_depends_on() {
        let resource = Resource::builder("Instance", "AWS::EC2::Instance")
            .depends_on("Subnet")
            .depends_on("Subnet")
            .depends_on("Network")
            .build();
        assert_eq!(resource.depends_on(), ["Subnet", "Network"]);
    }

    #[test]
    fn test_type_segments() {
        let resource = Resource::builder("Fn", "AWS::Lambda::Function").build();
        assert_eq!(resource.service(), "Lambda");
        assert_eq!(resource.short_type(), "Function");

        let custom = Resource::builder("C", "Custom").build();
        assert_eq!(custom.service(), "");
        assert_eq!(custom.short_type(), "Custom");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(DocumentFormat::detect(Path::new("a/b.JSON")), Some(DocumentFormat::Json));
        assert_eq!(DocumentFormat::detect(Path::new("stack.yml")), Some(DocumentFormat::Yaml));
        assert_eq!(DocumentFormat::detect(Path::new("stack.template")), None);
        assert_eq!(DocumentFormat::sniff(b"  \n{\"Resources\": {}}"), DocumentFormat::Json);
        assert_eq!(DocumentFormat::sniff(b"Resources: {}"), DocumentFormat::Yaml);
    }

    #[test]
    fn test_parameter_lenient_fields() {
        let param: Parameter = serde_json::from_value(serde_json::json!({
            "Type": "Number",
            "MinValue": "1",
            "NoEcho": "true"
        }))
        .unwrap();
        assert_eq!(param.type_name, "Number");
        assert_eq!(param.min_value, Some(serde_json::Number::from(1)));
        assert!(param.no_echo);

        let defaulted: Parameter = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(defaulted.type_name, "String");
        assert_eq!(serde_json::to_value(&defaulted).unwrap(), serde_json::json!({"Type": "String"}));
    }

    #[test]
    fn test_missing_resource_lookup() {
        let mut template = Template::new();
        template.insert_resource(
            Resource::builder("Queue", "AWS::SQS::Queue")
                .property("QueueName", refs::sub("${AWS::StackName}-q"))
                .build(),
        );
        assert!(template.resource("Queue").is_ok());
        assert!(matches!(template.resource("Topic"), Err(StackError::ResourceNotFound { .. })));
    }

    #[test]
    fn test_deletion_policy_parse() {
        assert_eq!("Snapshot".parse::<DeletionPolicy>().unwrap(), DeletionPolicy::Snapshot);
        assert!("Keep".parse::<DeletionPolicy>().is_err());
    }
}
