//! Ordering and SCC detection on large resource sets.

use std::time::Instant;

use stackgraph::graph::{GraphBuilder, creation_order, deletion_order, emission_order, find_sccs};
use stackgraph::refs;
use stackgraph::template::{Resource, ResourceSet, resource_set, to_document};
use stackgraph::test_utils::{chain, chain_id, ring};

const CHAIN_LEN: usize = 10_000;
const RING_LEN: usize = 5_000;

#[test]
fn test_long_chain_does_not_overflow() {
    let resources = chain(CHAIN_LEN);
    let start = Instant::now();
    let graph = GraphBuilder::new(&resources).build().unwrap();
    println!("built {CHAIN_LEN}-node chain in {:?}", start.elapsed());

    let start = Instant::now();
    let sccs = find_sccs(&graph);
    println!("found SCCs in {:?}", start.elapsed());
    assert_eq!(sccs.len(), CHAIN_LEN);
    assert!(sccs.iter().all(|c| c.is_trivial()));
    assert_eq!(sccs[0].members(), [chain_id(0)]);

    let order = creation_order(&graph).unwrap();
    let expected: Vec<String> = (0..CHAIN_LEN).map(chain_id).collect();
    assert_eq!(order, expected);

    let mut deletion = deletion_order(&graph).unwrap();
    deletion.reverse();
    assert_eq!(deletion, expected);

    let emitted: Vec<String> = emission_order(&graph).into_iter().flat_map(|g| g.members).collect();
    assert_eq!(emitted, expected);
}

#[test]
fn test_large_ring_is_one_component() {
    let resources = ring(RING_LEN);
    let graph = GraphBuilder::new(&resources).build().unwrap();

    let start = Instant::now();
    let sccs = find_sccs(&graph);
    println!("found SCCs of {RING_LEN}-node ring in {:?}", start.elapsed());
    assert_eq!(sccs.len(), 1);
    assert_eq!(sccs[0].members().len(), RING_LEN);

    let err = creation_order(&graph).unwrap_err();
    assert_eq!(err.cycle_members().len(), RING_LEN);

    let groups = emission_order(&graph);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members.len(), RING_LEN);
    // Every member but the last references a later one; the last closes the ring.
    assert_eq!(groups[0].forward_reference_count(), RING_LEN - 1);
}

/// Each resource references up to four earlier ones chosen by a fixed stride.
fn wide_dag(len: usize) -> ResourceSet {
    resource_set((0..len).map(|i| {
        let mut builder = Resource::builder(chain_id(i), "AWS::SQS::Queue");
        for (k, stride) in [1, 7, 31, 127].into_iter().enumerate() {
            if i >= stride {
                builder = builder.property(format!("Upstream{k}"), refs::reference(chain_id(i - stride)));
            }
        }
        builder.build()
    }))
}

#[test]
fn test_wide_dag_orders_and_serializes() {
    let resources = wide_dag(CHAIN_LEN);
    let graph = GraphBuilder::new(&resources).build().unwrap();
    assert!(graph.edge_count() > 3 * CHAIN_LEN);

    let start = Instant::now();
    let order = creation_order(&graph).unwrap();
    println!("ordered {} edges in {:?}", graph.edge_count(), start.elapsed());
    assert_eq!(order.len(), CHAIN_LEN);

    let start = Instant::now();
    let document = to_document(&resources, &order).unwrap();
    println!("serialized in {:?}", start.elapsed());
    assert_eq!(document.resource_ids().len(), CHAIN_LEN);
    assert_eq!(document.resource_ids()[0], chain_id(0));
}
