//! Loading declaration units into a registry and ordering the snapshot.

use anyhow::Result;
use std::sync::Arc;

use stackgraph::graph::{GraphBuilder, creation_order};
use stackgraph::registry::{
    DeclarationUnit, Registry, ResourceDescriptor, TemplateUnit, UnitDeclarations, load_units,
};
use stackgraph::refs;
use stackgraph::template::{Resource, Template};

use crate::common::TestProject;

/// Resources declared in code, one unit per "module".
struct ModuleUnit {
    module: String,
    resources: Vec<Resource>,
}

impl DeclarationUnit for ModuleUnit {
    fn name(&self) -> String {
        self.module.clone()
    }

    fn declarations(&self) -> stackgraph::core::Result<UnitDeclarations> {
        Ok(UnitDeclarations {
            resources: self
                .resources
                .iter()
                .cloned()
                .map(|r| ResourceDescriptor::from_resource(self.module.clone(), r))
                .collect(),
            context: Template::new(),
        })
    }
}

#[tokio::test]
async fn test_many_units_load_concurrently() -> Result<()> {
    let registry = Arc::new(Registry::new());
    let units: Vec<ModuleUnit> = (0..32)
        .map(|m| ModuleUnit {
            module: format!("app.module{m:02}"),
            resources: (0..10)
                .map(|r| {
                    let builder = Resource::builder(format!("M{m:02}R{r}"), "AWS::SQS::Queue");
                    if r == 0 {
                        builder.build()
                    } else {
                        builder.property("Upstream", refs::reference(format!("M{m:02}R{}", r - 1))).build()
                    }
                })
                .collect(),
        })
        .collect();

    let loaded = load_units(Arc::clone(&registry), units).await?;
    assert_eq!(loaded.len(), 32);
    assert_eq!(registry.len(), 320);
    assert_eq!(registry.get_by_type("AWS::SQS::Queue").len(), 320);
    assert_eq!(registry.get_all(Some("app.module07")).len(), 10);

    let snapshot = registry.snapshot()?;
    let graph = GraphBuilder::new(&snapshot).build()?;
    let order = creation_order(&graph)?;
    assert_eq!(order.len(), 320);
    assert_eq!(order[0], "M00R0");
    Ok(())
}

#[tokio::test]
async fn test_template_units_merge_into_one_graph() -> Result<()> {
    let project = TestProject::new()?;
    let network = project.write(
        "network.yaml",
        "Resources:\n  Network:\n    Type: AWS::EC2::VPC\n  Subnet:\n    Type: AWS::EC2::Subnet\n    Properties:\n      VpcId: !Ref Network\n",
    )?;
    let compute = project.write(
        "compute.json",
        r#"{"Resources": {"Instance": {"Type": "AWS::EC2::Instance", "Properties": {"SubnetId": {"Ref": "Subnet"}}}}}"#,
    )?;

    let registry = Arc::new(Registry::new());
    load_units(Arc::clone(&registry), vec![TemplateUnit::new(&network), TemplateUnit::new(&compute)]).await?;

    assert_eq!(registry.get_by_name("Instance").map(|d| d.scope), Some(compute.display().to_string()));
    let snapshot = registry.snapshot()?;
    let graph = GraphBuilder::new(&snapshot).build()?;
    assert_eq!(creation_order(&graph)?, vec!["Network", "Subnet", "Instance"]);

    registry.clear();
    assert!(registry.is_empty());
    Ok(())
}
