//! Ordering invariants over generated resource sets, determinism and round-trips.

use std::collections::{BTreeMap, BTreeSet};

use stackgraph::graph::{
    DependencyGraph, GraphBuilder, creation_order, deletion_order, emission_order, find_sccs,
};
use stackgraph::refs::{self, LogicalId};
use stackgraph::template::{DocumentFormat, Resource, ResourceSet, Template, resource_set};
use stackgraph::test_utils::{TemplateFixture, chain_id, ring};

/// Deterministic pseudo-random sequence for generated graphs.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

/// A DAG where each resource may reference any resource with a smaller index.
fn random_dag(seed: u64, len: usize) -> ResourceSet {
    let mut rng = Lcg(seed);
    resource_set((0..len).map(|i| {
        let mut builder = Resource::builder(chain_id(i), "AWS::SNS::Topic");
        for j in 0..i {
            if rng.next() % 4 == 0 {
                builder = builder.property(format!("Ref{j}"), refs::reference(chain_id(j)));
            }
        }
        builder.build()
    }))
}

fn assert_respects_dependencies(graph: &DependencyGraph, order: &[LogicalId]) {
    let position: BTreeMap<&str, usize> =
        order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
    assert_eq!(position.len(), graph.node_count(), "order must be a permutation");
    for id in graph.ids() {
        for dep in graph.dependencies(id) {
            assert!(position[dep] < position[id], "{dep} must come before {id}");
        }
    }
}

#[test]
fn test_creation_order_respects_dependencies() {
    for seed in 1..=20 {
        let resources = random_dag(seed, 40);
        let graph = GraphBuilder::new(&resources).build().unwrap();
        let order = creation_order(&graph).unwrap();
        assert_respects_dependencies(&graph, &order);

        let mut reversed = deletion_order(&graph).unwrap();
        reversed.reverse();
        assert_eq!(reversed, order);
    }
}

#[test]
fn test_sccs_partition_every_node() {
    // Two rings joined by a chain edge, plus free-standing nodes.
    let mut resources = ring(5);
    for i in 10..14 {
        let next = if i == 13 { 10 } else { i + 1 };
        resources.insert(
            chain_id(i),
            Resource::builder(chain_id(i), "AWS::SNS::Topic")
                .property("Next", refs::reference(chain_id(next)))
                .property("Upstream", refs::reference(chain_id(0)))
                .build(),
        );
    }
    for i in 20..23 {
        resources.insert(chain_id(i), Resource::builder(chain_id(i), "AWS::SNS::Topic").build());
    }

    let graph = GraphBuilder::new(&resources).build().unwrap();
    let sccs = find_sccs(&graph);

    let mut seen = BTreeSet::new();
    for component in &sccs {
        for member in component.members() {
            assert!(seen.insert(member.clone()), "{member} appears in two components");
        }
    }
    assert_eq!(seen.len(), resources.len());
    assert_eq!(sccs.iter().filter(|c| !c.is_trivial()).count(), 2);

    let err = creation_order(&graph).unwrap_err();
    assert_eq!(err.cycle_members().len(), 9);

    // The ring every other cycle depends on is emitted first.
    let groups = emission_order(&graph);
    assert_eq!(groups[0].members.len(), 5);
    let emitted: usize = groups.iter().map(|g| g.members.len()).sum();
    assert_eq!(emitted, resources.len());
}

#[test]
fn test_ordering_is_deterministic() {
    let resources = random_dag(7, 60);
    let graph = GraphBuilder::new(&resources).build().unwrap();
    let first = creation_order(&graph).unwrap();
    let second = creation_order(&GraphBuilder::new(&resources).build().unwrap()).unwrap();
    assert_eq!(first, second);

    // Same resources collected in reverse order.
    let reinserted: ResourceSet = resource_set(resources.values().rev().cloned());
    let third = creation_order(&GraphBuilder::new(&reinserted).build().unwrap()).unwrap();
    assert_eq!(first, third);
}

#[test]
fn test_round_trip_reproduces_graph() {
    for fixture in [TemplateFixture::linear_chain(), TemplateFixture::full_stack()] {
        let template = fixture.parse().unwrap();
        let graph = GraphBuilder::for_template(&template).build().unwrap();
        let document = template.to_document().unwrap();

        for (bytes, format) in [
            (document.to_json_pretty().unwrap().into_bytes(), DocumentFormat::Json),
            (document.to_yaml().unwrap().into_bytes(), DocumentFormat::Yaml),
        ] {
            let reparsed = Template::parse(&bytes, format).unwrap();
            let regraph = GraphBuilder::for_template(&reparsed).build().unwrap();
            assert_eq!(regraph.to_map(), graph.to_map(), "{} via {format}", fixture.name);
            assert_eq!(reparsed.resources, template.resources, "{} via {format}", fixture.name);
        }
    }
}

#[test]
fn test_round_trip_preserves_cycles_in_adjacency() {
    let template = TemplateFixture::two_node_cycle().parse().unwrap();
    let graph = GraphBuilder::for_template(&template).build().unwrap();
    let rebuilt = DependencyGraph::from_map(&graph.to_map()).unwrap();
    assert_eq!(rebuilt.to_map(), graph.to_map());
    assert_eq!(find_sccs(&rebuilt), find_sccs(&graph));
}
