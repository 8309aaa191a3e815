//! Registry of declared resources
//!
//! A [`Registry`] collects resource declarations while declaration units load, then
//! hands out snapshots for graph work. Its lifecycle is
//! `create → register* → snapshot → clear`; construct a fresh one (or call
//! [`Registry::clear`]) between independent builds and tests.
//!
//! # Concurrency
//!
//! Both indexes (by name and by resource type) sit behind one mutex, held only for the
//! duration of a single call. A concurrent reader therefore never sees a name registered
//! without its type entry. Readers get owned copies; graph computations run on those
//! copies and never hold the lock.
//!
//! # Submodules
//!
//! - [`loader`] - [`DeclarationUnit`] and concurrent [`load_units`]

pub mod loader;

pub use loader::{DeclarationUnit, LoadedUnit, TemplateUnit, UnitDeclarations, load_units};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::core::{Result, StackError};
use crate::template::{Resource, ResourceSet};

/// A declared resource with its declaration name and scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Declaration name, unique within the registry
    pub name: String,
    /// Declaring unit, e.g. a module path or template file path
    pub scope: String,
    pub resource: Resource,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, scope: impl Into<String>, resource: Resource) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
            resource,
        }
    }

    /// Descriptor named after the resource's logical id.
    pub fn from_resource(scope: impl Into<String>, resource: Resource) -> Self {
        let name = resource.logical_id().to_string();
        Self::new(name, scope, resource)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    descriptor: ResourceDescriptor,
    resource_type: String,
}

#[derive(Debug, Default)]
struct Indexes {
    by_name: BTreeMap<String, Entry>,
    by_type: BTreeMap<String, BTreeSet<String>>,
}

/// Thread-safe collection of resource declarations.
///
/// ```rust
/// use stackgraph::registry::{Registry, ResourceDescriptor};
/// use stackgraph::template::Resource;
///
/// let registry = Registry::new();
/// let bucket = Resource::builder("Bucket", "AWS::S3::Bucket").build();
/// registry.register(ResourceDescriptor::from_resource("storage", bucket), None);
///
/// assert_eq!(registry.get_by_type("AWS::S3::Bucket").len(), 1);
/// assert!(registry.get_by_name("Bucket").is_some());
/// registry.clear();
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<Indexes>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section leaves both indexes consistent, so a poisoned lock still
    // guards valid state.
    fn lock(&self) -> MutexGuard<'_, Indexes> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a declaration under its name.
    ///
    /// `resource_type` defaults to the resource's type name. Registering a name again
    /// replaces the previous declaration in both indexes atomically and returns it.
    pub fn register(
        &self,
        descriptor: ResourceDescriptor,
        resource_type: Option<&str>,
    ) -> Option<ResourceDescriptor> {
        let resource_type =
            resource_type.map_or_else(|| descriptor.resource.type_name().to_string(), str::to_string);
        let name = descriptor.name.clone();

        let mut indexes = self.lock();
        let previous = indexes.by_name.remove(&name);
        if let Some(previous) = &previous {
            debug!("Replacing registered resource '{}' ({})", name, previous.resource_type);
            if let Some(names) = indexes.by_type.get_mut(&previous.resource_type) {
                names.remove(&name);
                if names.is_empty() {
                    indexes.by_type.remove(&previous.resource_type);
                }
            }
        }
        indexes.by_type.entry(resource_type.clone()).or_default().insert(name.clone());
        indexes.by_name.insert(
            name,
            Entry {
                descriptor,
                resource_type,
            },
        );

        previous.map(|entry| entry.descriptor)
    }

    /// Every declaration, sorted by name, optionally limited to scopes starting with
    /// `scope_filter`.
    pub fn get_all(&self, scope_filter: Option<&str>) -> Vec<ResourceDescriptor> {
        let indexes = self.lock();
        indexes
            .by_name
            .values()
            .filter(|entry| scope_filter.is_none_or(|prefix| entry.descriptor.scope.starts_with(prefix)))
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// Declarations registered under `resource_type`, sorted by name.
    pub fn get_by_type(&self, resource_type: &str) -> Vec<ResourceDescriptor> {
        let indexes = self.lock();
        indexes
            .by_type
            .get(resource_type)
            .into_iter()
            .flatten()
            .filter_map(|name| indexes.by_name.get(name))
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    pub fn get_by_name(&self, name: &str) -> Option<ResourceDescriptor> {
        self.lock().by_name.get(name).map(|entry| entry.descriptor.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lock().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().by_name.is_empty()
    }

    /// Registered resource types, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.lock().by_type.keys().cloned().collect()
    }

    /// Copy of every registered resource, keyed by logical id.
    ///
    /// # Errors
    ///
    /// [`StackError::DuplicateLogicalId`] when two registration names carry resources
    /// with the same logical id; the first such id is reported with every name using it.
    pub fn snapshot(&self) -> Result<ResourceSet> {
        let indexes = self.lock();
        let mut by_id: BTreeMap<&str, Vec<&Entry>> = BTreeMap::new();
        for entry in indexes.by_name.values() {
            by_id.entry(entry.descriptor.resource.logical_id()).or_default().push(entry);
        }

        if let Some((logical_id, entries)) = by_id.iter().find(|(_, entries)| entries.len() > 1) {
            return Err(StackError::DuplicateLogicalId {
                logical_id: (*logical_id).to_string(),
                names: entries.iter().map(|entry| entry.descriptor.name.clone()).collect(),
            });
        }

        Ok(by_id
            .into_iter()
            .flat_map(|(logical_id, entries)| {
                entries.into_iter().map(move |entry| (logical_id.to_string(), entry.descriptor.resource.clone()))
            })
            .collect())
    }

    pub fn clear(&self) {
        let mut indexes = self.lock();
        indexes.by_name.clear();
        indexes.by_type.clear();
    }
}
