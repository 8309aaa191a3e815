//! stackgraph - reference graph engine for infrastructure templates
//!
//! stackgraph turns the typed references inside an infrastructure template (`Ref`,
//! `Fn::GetAtt`, `Fn::Sub` placeholders, `DependsOn`) into a dependency graph, orders
//! resources for creation and deletion, and detects cycles. Imported templates can also
//! have implicit dependencies recovered from `Fn::Sub` strings and be ordered even when
//! they contain cycles.
//!
//! # Architecture Overview
//!
//! Everything flows through one immutable snapshot of the resource set:
//!
//! 1. A [`template::Template`] is parsed from JSON or YAML, or built in code, or
//!    collected through a [`registry::Registry`]
//! 2. [`graph::GraphBuilder`] derives a [`graph::DependencyGraph`] from the references
//! 3. [`graph::find_sccs`] finds cycles; [`graph::creation_order`],
//!    [`graph::deletion_order`] and [`graph::emission_order`] order the graph
//! 4. [`template::to_document`] writes the resources back out in a chosen order
//!
//! The graph is derived data: rebuild it whenever the resource set changes.
//!
//! # Core Modules
//!
//! ## Model
//! - [`refs`] - Reference values, intrinsic functions and reference collection
//! - [`template`] - Template IR, document parser and serializer
//!
//! ## Graph Engine
//! - [`graph`] - Graph builder, heuristic recovery, SCC detection and ordering
//!
//! ## Supporting Modules
//! - [`core`] - Error types and user-facing error presentation
//! - [`registry`] - Thread-safe declaration registry and concurrent unit loading
//! - [`catalog`] - Resource type catalogs and property-name validation
//! - [`import`] - Parse, recover and order an existing template in one step
//! - [`config`] - `~/.stackgraph/config.toml` loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```rust
//! use stackgraph::graph::{GraphBuilder, creation_order};
//! use stackgraph::template::{DocumentFormat, Template};
//!
//! let template = Template::parse(
//!     br#"
//! Resources:
//!   Subnet:
//!     Type: AWS::EC2::Subnet
//!     Properties:
//!       VpcId: !Ref Network
//!   Network:
//!     Type: AWS::EC2::VPC
//! "#,
//!     DocumentFormat::Yaml,
//! )
//! .unwrap();
//!
//! let graph = GraphBuilder::for_template(&template).build().unwrap();
//! assert_eq!(creation_order(&graph).unwrap(), ["Network", "Subnet"]);
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! stackgraph order stack.yaml
//! stackgraph order stack.yaml --deletion
//! stackgraph graph stack.yaml --root Instance
//! stackgraph import legacy.json --json
//! stackgraph validate stack.yaml --catalog types.json
//! stackgraph build network.yaml compute.yaml --output stack.json
//! ```

// Model
pub mod refs;
pub mod template;

// Graph engine
pub mod graph;

// Supporting modules
pub mod catalog;
pub mod cli;
pub mod config;
pub mod core;
pub mod import;
pub mod registry;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
