//! Dependency graph engine
//!
//! Everything here is a pure function over an immutable resource-set snapshot: derive a
//! graph, find its strongly connected components, and order it.
//!
//! # Submodules
//!
//! - [`builder`] - [`GraphBuilder`] derives a [`DependencyGraph`] from typed references,
//!   `DependsOn` lists and (for imports) heuristic recovery
//! - [`recovery`] - [`PatternIndex`] name/ARN pattern maps for `Fn::Sub` recovery
//! - [`scc`] - Iterative Tarjan [`find_sccs`] and [`detect_cycles`]
//! - [`ordering`] - [`creation_order`], [`deletion_order`] and the cycle-tolerant
//!   [`emission_order`]
//!
//! # Example
//!
//! ```rust
//! use stackgraph::graph::{GraphBuilder, creation_order, deletion_order};
//! use stackgraph::refs;
//! use stackgraph::template::{Resource, resource_set};
//!
//! let resources = resource_set([
//!     Resource::builder("Network", "AWS::EC2::VPC").build(),
//!     Resource::builder("Subnet", "AWS::EC2::Subnet")
//!         .property("VpcId", refs::reference("Network"))
//!         .build(),
//!     Resource::builder("Instance", "AWS::EC2::Instance")
//!         .property("SubnetId", refs::reference("Subnet"))
//!         .build(),
//! ]);
//!
//! let graph = GraphBuilder::new(&resources).build().unwrap();
//! assert_eq!(creation_order(&graph).unwrap(), ["Network", "Subnet", "Instance"]);
//! assert_eq!(deletion_order(&graph).unwrap(), ["Instance", "Subnet", "Network"]);
//! ```

pub mod builder;
pub mod ordering;
pub mod recovery;
pub mod scc;

pub use builder::{
    DependencyGraph, EdgeKind, ExpectedTarget, GraphBuilder, Scope, UnresolvedReference,
};
pub use ordering::{
    EmissionGroup, creation_order, deletion_order, emission_order, resources_in_creation_order,
    resources_in_deletion_order,
};
pub use recovery::{AmbiguousRecovery, PatternIndex, RecoveredEdge, RecoveryOutcome};
pub use scc::{StronglyConnectedComponent, detect_cycles, ensure_acyclic, find_sccs};
