//! Resource type catalog and property-name validation
//!
//! A catalog answers one question: which property names does a resource type accept?
//! [`validate_properties`] checks a resource set against one and reports every unknown
//! property at once. Types the catalog does not describe are skipped, so a partial
//! catalog is still useful.
//!
//! # Example
//!
//! ```rust
//! use stackgraph::catalog::{StaticCatalog, validate_properties};
//! use stackgraph::template::{Resource, resource_set};
//!
//! let catalog = StaticCatalog::from_json(r#"{"AWS::S3::Bucket": ["BucketName", "Tags"]}"#).unwrap();
//! let resources = resource_set([Resource::builder("Bucket", "AWS::S3::Bucket")
//!     .property("BucketNmae", "logs")
//!     .build()]);
//!
//! let err = validate_properties(&resources, &catalog).unwrap_err();
//! assert!(err.to_string().contains("did you mean 'BucketName'"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use crate::core::{Result, StackError};
use crate::refs::LogicalId;
use crate::template::ResourceSet;

/// Source of per-type property schemas.
pub trait ResourceCatalog {
    /// Property names accepted by `type_name`, or `None` if the type is not described.
    fn property_names(&self, type_name: &str) -> Option<BTreeSet<String>>;
}

/// In-memory catalog: resource type → accepted property names.
///
/// Serialized as a plain map, e.g. `{"AWS::S3::Bucket": ["BucketName", "Tags"]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCatalog {
    types: BTreeMap<String, BTreeSet<String>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe `type_name`, replacing any previous description.
    #[must_use]
    pub fn with_type<I, S>(mut self, type_name: impl Into<String>, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.insert(type_name.into(), properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a catalog file. `.toml` files are read as TOML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let is_toml = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Ok(toml::from_str(&content)?)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl ResourceCatalog for StaticCatalog {
    fn property_names(&self, type_name: &str) -> Option<BTreeSet<String>> {
        self.types.get(type_name).cloned()
    }
}

/// A property the catalog does not accept for the resource's type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnknownProperty {
    pub logical_id: LogicalId,
    pub type_name: String,
    pub property: String,
    /// Closest accepted property name, if any is close
    pub suggestion: Option<String>,
}

impl fmt::Display for UnknownProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) has unknown property '{}'",
            self.logical_id, self.type_name, self.property
        )?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{suggestion}'?)")?;
        }
        Ok(())
    }
}

fn closest(property: &str, known: &BTreeSet<String>) -> Option<String> {
    let limit = property.len().div_ceil(2);
    known
        .iter()
        .map(|name| (strsim::levenshtein(property, name), name))
        .filter(|(distance, _)| *distance <= limit)
        .min()
        .map(|(_, name)| name.clone())
}

/// Check every resource's property names against `catalog`.
///
/// # Errors
///
/// [`StackError::UnknownProperties`] listing every unknown property, sorted by logical id
/// and property name.
pub fn validate_properties(resources: &ResourceSet, catalog: &impl ResourceCatalog) -> Result<()> {
    let mut unknown = Vec::new();
    for resource in resources.values() {
        let Some(known) = catalog.property_names(resource.type_name()) else {
            continue;
        };
        for property in resource.properties().keys() {
            if !known.contains(property) {
                unknown.push(UnknownProperty {
                    logical_id: resource.logical_id().to_string(),
                    type_name: resource.type_name().to_string(),
                    property: property.clone(),
                    suggestion: closest(property, &known),
                });
            }
        }
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        unknown.sort();
        Err(StackError::UnknownProperties {
            properties: unknown,
        })
    }
}
