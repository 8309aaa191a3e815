//! Heuristic recovery settings.
//!
//! Built-in tables cover the resource types whose name and ARN are conventionally
//! derived from one name property. User tables extend or override them per type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::{Result, StackError};

/// Replaced with the name property's value in an ARN template.
pub(crate) const NAME_PLACEHOLDER: &str = "{name}";

/// `(type, name property, ARN templates)` for the built-in pattern tables.
///
/// `{name}` in an ARN template is replaced with the value of the name property.
const BUILTIN_PATTERNS: &[(&str, &str, &[&str])] = &[
    (
        "AWS::S3::Bucket",
        "BucketName",
        &["arn:${AWS::Partition}:s3:::{name}", "arn:${AWS::Partition}:s3:::{name}/*"],
    ),
    ("AWS::IAM::Role", "RoleName", &["arn:${AWS::Partition}:iam::${AWS::AccountId}:role/{name}"]),
    (
        "AWS::IAM::ManagedPolicy",
        "ManagedPolicyName",
        &["arn:${AWS::Partition}:iam::${AWS::AccountId}:policy/{name}"],
    ),
    ("AWS::IAM::User", "UserName", &["arn:${AWS::Partition}:iam::${AWS::AccountId}:user/{name}"]),
    ("AWS::IAM::Group", "GroupName", &["arn:${AWS::Partition}:iam::${AWS::AccountId}:group/{name}"]),
    (
        "AWS::IAM::InstanceProfile",
        "InstanceProfileName",
        &["arn:${AWS::Partition}:iam::${AWS::AccountId}:instance-profile/{name}"],
    ),
    (
        "AWS::Lambda::Function",
        "FunctionName",
        &["arn:${AWS::Partition}:lambda:${AWS::Region}:${AWS::AccountId}:function:{name}"],
    ),
    (
        "AWS::SQS::Queue",
        "QueueName",
        &["arn:${AWS::Partition}:sqs:${AWS::Region}:${AWS::AccountId}:{name}"],
    ),
    (
        "AWS::SNS::Topic",
        "TopicName",
        &["arn:${AWS::Partition}:sns:${AWS::Region}:${AWS::AccountId}:{name}"],
    ),
    (
        "AWS::DynamoDB::Table",
        "TableName",
        &[
            "arn:${AWS::Partition}:dynamodb:${AWS::Region}:${AWS::AccountId}:table/{name}",
            "arn:${AWS::Partition}:dynamodb:${AWS::Region}:${AWS::AccountId}:table/{name}/index/*",
        ],
    ),
    (
        "AWS::Logs::LogGroup",
        "LogGroupName",
        &[
            "arn:${AWS::Partition}:logs:${AWS::Region}:${AWS::AccountId}:log-group:{name}",
            "arn:${AWS::Partition}:logs:${AWS::Region}:${AWS::AccountId}:log-group:{name}:*",
        ],
    ),
    (
        "AWS::Kinesis::Stream",
        "Name",
        &["arn:${AWS::Partition}:kinesis:${AWS::Region}:${AWS::AccountId}:stream/{name}"],
    ),
    (
        "AWS::StepFunctions::StateMachine",
        "StateMachineName",
        &["arn:${AWS::Partition}:states:${AWS::Region}:${AWS::AccountId}:stateMachine:{name}"],
    ),
    (
        "AWS::ECR::Repository",
        "RepositoryName",
        &["arn:${AWS::Partition}:ecr:${AWS::Region}:${AWS::AccountId}:repository/{name}"],
    ),
    (
        "AWS::SecretsManager::Secret",
        "Name",
        &["arn:${AWS::Partition}:secretsmanager:${AWS::Region}:${AWS::AccountId}:secret:{name}-*"],
    ),
];

fn builtin(type_name: &str) -> Option<&'static (&'static str, &'static str, &'static [&'static str])> {
    BUILTIN_PATTERNS.iter().find(|(t, _, _)| *t == type_name)
}

const fn default_enabled() -> bool {
    true
}

/// `[recovery]` table.
///
/// ```toml
/// [recovery]
/// enabled = true
///
/// [recovery.name_properties]
/// "Custom::Store" = "StoreName"
///
/// [recovery.arn_templates]
/// "Custom::Store" = ["arn:${AWS::Partition}:store:::{name}"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Turn heuristic recovery on or off.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Resource type → name-producing property, on top of the built-ins.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub name_properties: BTreeMap<String, String>,

    /// Resource type → ARN templates containing `{name}`, on top of the built-ins.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arn_templates: BTreeMap<String, Vec<String>>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            name_properties: BTreeMap::new(),
            arn_templates: BTreeMap::new(),
        }
    }
}

impl RecoveryConfig {
    /// Recovery switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Name property for `type_name`: user table first, then built-ins.
    pub fn name_property(&self, type_name: &str) -> Option<&str> {
        self.name_properties
            .get(type_name)
            .map(String::as_str)
            .or_else(|| builtin(type_name).map(|(_, property, _)| *property))
    }

    /// ARN templates for `type_name`: a user entry replaces the built-in list.
    pub fn arn_templates(&self, type_name: &str) -> Vec<&str> {
        match self.arn_templates.get(type_name) {
            Some(templates) => templates.iter().map(String::as_str).collect(),
            None => builtin(type_name).map(|(_, _, templates)| templates.to_vec()).unwrap_or_default(),
        }
    }

    /// Check the user tables.
    ///
    /// # Errors
    ///
    /// [`StackError::ConfigError`] for an empty name property, or an ARN template
    /// without the `{name}` placeholder.
    pub fn validate(&self) -> Result<()> {
        if let Some((type_name, _)) = self.name_properties.iter().find(|(_, p)| p.trim().is_empty()) {
            return Err(StackError::ConfigError {
                message: format!("recovery.name_properties.\"{type_name}\" is empty"),
            });
        }
        for (type_name, templates) in &self.arn_templates {
            if let Some(template) = templates.iter().find(|t| !t.contains(NAME_PLACEHOLDER)) {
                return Err(StackError::ConfigError {
                    message: format!(
                        "ARN template '{template}' for {type_name} has no {NAME_PLACEHOLDER} placeholder"
                    ),
                });
            }
        }
        Ok(())
    }

    /// Every type with a name property, sorted.
    pub fn known_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = BUILTIN_PATTERNS
            .iter()
            .map(|(t, _, _)| *t)
            .chain(self.name_properties.keys().map(String::as_str))
            .collect();
        types.sort_unstable();
        types.dedup();
        types
    }
}
