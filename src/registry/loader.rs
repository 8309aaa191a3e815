//! Concurrent loading of declaration units into a [`Registry`].
//!
//! A declaration unit is anything that yields resource declarations: a template file,
//! or a set of resources built in code. Units load on Tokio's blocking pool since
//! parsing is synchronous; registration goes through the registry's lock, so units may
//! finish in any order.

use futures::future::try_join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::{Registry, ResourceDescriptor};
use crate::core::{Result, StackError};
use crate::template::{DocumentFormat, Template};

/// What one unit declares.
#[derive(Debug, Clone, Default)]
pub struct UnitDeclarations {
    pub resources: Vec<ResourceDescriptor>,
    /// Parameters, conditions, mappings and outputs declared next to the resources.
    /// Its `resources` map is empty.
    pub context: Template,
}

/// A source of resource declarations.
pub trait DeclarationUnit: Send + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> String;

    /// Produce the unit's declarations. Called on a blocking thread.
    fn declarations(&self) -> Result<UnitDeclarations>;
}

/// Result of loading one unit.
#[derive(Debug, Clone)]
pub struct LoadedUnit {
    pub name: String,
    /// Declaration names registered by this unit, in registration order
    pub registered: Vec<String>,
    pub context: Template,
}

/// Load `units` concurrently and register their declarations.
///
/// Results come back in the order of `units`. When two units declare the same name,
/// whichever registers last wins.
///
/// # Errors
///
/// Returns the first unit error, or [`StackError::Other`] if a loading task panics.
pub async fn load_units<U>(registry: Arc<Registry>, units: Vec<U>) -> Result<Vec<LoadedUnit>>
where
    U: DeclarationUnit,
{
    let tasks = units.into_iter().map(|unit| {
        let registry = Arc::clone(&registry);
        async move {
            let name = unit.name();
            tokio::task::spawn_blocking(move || register_unit(&registry, &unit))
                .await
                .map_err(|e| StackError::Other {
                    message: format!("Task join error while loading {name}: {e}"),
                })?
        }
    });

    try_join_all(tasks).await
}

fn register_unit<U: DeclarationUnit>(registry: &Registry, unit: &U) -> Result<LoadedUnit> {
    let name = unit.name();
    let UnitDeclarations {
        resources,
        context,
    } = unit.declarations()?;

    let mut registered = Vec::with_capacity(resources.len());
    for descriptor in resources {
        registered.push(descriptor.name.clone());
        if let Some(previous) = registry.register(descriptor, None) {
            debug!("{} redeclares '{}' from {}", name, previous.name, previous.scope);
        }
    }
    debug!("Loaded {} declaration(s) from {}", registered.len(), name);

    Ok(LoadedUnit {
        name,
        registered,
        context,
    })
}

/// A template file loaded as a declaration unit. Each resource's scope is the file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateUnit {
    path: PathBuf,
    format: Option<DocumentFormat>,
}

impl TemplateUnit {
    /// Format comes from the extension, falling back to sniffing the content.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read and parse the file.
    ///
    /// Parse errors carry the file path.
    pub fn load(&self) -> Result<Template> {
        let bytes = std::fs::read(&self.path)?;
        let format = self
            .format
            .or_else(|| DocumentFormat::detect(&self.path))
            .unwrap_or_else(|| DocumentFormat::sniff(&bytes));
        Template::parse(&bytes, format).map_err(|err| match err {
            StackError::Parse {
                location,
                message,
            } => StackError::Parse {
                location,
                message: format!("{message} (in {})", self.path.display()),
            },
            other => other,
        })
    }
}

impl DeclarationUnit for TemplateUnit {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn declarations(&self) -> Result<UnitDeclarations> {
        let mut context = self.load()?;
        let scope = self.name();
        let resources = std::mem::take(&mut context.resources)
            .into_values()
            .map(|resource| ResourceDescriptor::from_resource(scope.clone(), resource))
            .collect();
        Ok(UnitDeclarations {
            resources,
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Resource;
    use tempfile::TempDir;

    struct CodeUnit {
        name: &'static str,
        ids: Vec<&'static str>,
    }

    impl DeclarationUnit for CodeUnit {
        fn name(&self) -> String {
            self.name.to_string()
        }

        fn declarations(&self) -> Result<UnitDeclarations> {
            Ok(UnitDeclarations {
                resources: self
                    .ids
                    .iter()
                    .map(|id| {
                        ResourceDescriptor::from_resource(self.name, Resource::builder(*id, "AWS::SNS::Topic").build())
                    })
                    .collect(),
                context: Template::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_load_code_units() {
        let registry = Arc::new(Registry::new());
        let units = vec![
            CodeUnit {
                name: "app.alerts",
                ids: vec!["Alarm", "Page"],
            },
            CodeUnit {
                name: "app.audit",
                ids: vec!["Trail"],
            },
        ];

        let loaded = load_units(Arc::clone(&registry), units).await.unwrap();
        assert_eq!(loaded[0].name, "app.alerts");
        assert_eq!(loaded[0].registered, vec!["Alarm", "Page"]);
        assert_eq!(loaded[1].registered, vec!["Trail"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get_all(Some("app.audit")).len(), 1);
    }

    #[tokio::test]
    async fn test_template_unit_scopes_by_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("network.yaml");
        std::fs::write(
            &path,
            "Parameters:\n  Cidr:\n    Type: String\nResources:\n  Network:\n    Type: AWS::EC2::VPC\n    Properties:\n      CidrBlock: !Ref Cidr\n",
        )
        .unwrap();

        let registry = Arc::new(Registry::new());
        let loaded = load_units(Arc::clone(&registry), vec![TemplateUnit::new(&path)]).await.unwrap();

        let descriptor = registry.get_by_name("Network").unwrap();
        assert_eq!(descriptor.scope, path.display().to_string());
        assert!(loaded[0].context.parameters.contains_key("Cidr"));
        assert!(loaded[0].context.resources.is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{\"Resources\": ").unwrap();

        let err = load_units(Arc::new(Registry::new()), vec![TemplateUnit::new(&path)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken.json"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = TemplateUnit::new("/nonexistent/stack.yaml").load().unwrap_err();
        assert!(matches!(err, StackError::IoError(_)));
    }
}
