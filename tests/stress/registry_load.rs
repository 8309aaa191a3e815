//! Concurrent registration at scale.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use stackgraph::graph::{GraphBuilder, creation_order};
use stackgraph::registry::{DeclarationUnit, Registry, ResourceDescriptor, UnitDeclarations, load_units};
use stackgraph::refs;
use stackgraph::template::{Resource, Template};

const UNITS: usize = 200;
const PER_UNIT: usize = 50;

/// A self-contained chain whose ids are prefixed with the unit number.
struct ChainUnit(usize);

impl DeclarationUnit for ChainUnit {
    fn name(&self) -> String {
        format!("unit{:03}", self.0)
    }

    fn declarations(&self) -> stackgraph::core::Result<UnitDeclarations> {
        let prefix = format!("U{:03}", self.0);
        let resources = (0..PER_UNIT)
            .map(|i| {
                let builder = Resource::builder(format!("{prefix}R{i:03}"), "AWS::SNS::Topic");
                let resource = if i == 0 {
                    builder.build()
                } else {
                    builder.property("Previous", refs::reference(format!("{prefix}R{:03}", i - 1))).build()
                };
                ResourceDescriptor::from_resource(self.name(), resource)
            })
            .collect();
        Ok(UnitDeclarations {
            resources,
            context: Template::new(),
        })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_many_units_register_concurrently() -> Result<()> {
    let registry = Arc::new(Registry::new());
    let units: Vec<ChainUnit> = (0..UNITS).map(ChainUnit).collect();

    let start = Instant::now();
    let loaded = load_units(Arc::clone(&registry), units).await?;
    println!("registered {} resources in {:?}", registry.len(), start.elapsed());

    assert_eq!(loaded.len(), UNITS);
    assert_eq!(registry.len(), UNITS * PER_UNIT);
    assert_eq!(registry.get_all(Some("unit042")).len(), PER_UNIT);

    let snapshot = registry.snapshot()?;
    let graph = GraphBuilder::new(&snapshot).build()?;
    assert_eq!(graph.edge_count(), UNITS * (PER_UNIT - 1));
    let order = creation_order(&graph)?;
    assert_eq!(order.len(), UNITS * PER_UNIT);
    Ok(())
}
