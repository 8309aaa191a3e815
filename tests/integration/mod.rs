//! Integration test suite for stackgraph
//!
//! End-to-end tests through the public library API and the `stackgraph` binary. These
//! run quickly and are executed in CI on every commit.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **scenarios**: The reference graph scenarios (chain, cycle, recovery, unresolved,
//!   serialization)
//! - **properties**: Ordering invariants, determinism and round-trips over generated sets
//! - **registry**: Concurrent loading of declaration units
//! - **cli**: Every command through the binary
//! - **config**: Configuration discovery, including the environment variable

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod config;
mod properties;
mod registry;
mod scenarios;
