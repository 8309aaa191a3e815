//! Stress test suite for stackgraph
//!
//! Large resource sets that exercise the graph algorithms well past the depth where a
//! recursive implementation would overflow the stack, and concurrent registration at a
//! scale the integration suite does not reach. These tests take longer than the
//! integration tests and are **not executed in CI**.
//!
//! Timings are printed with `println!` for manual review rather than asserted.
//!
//! # Running Stress Tests
//!
//! ```bash
//! cargo test --test stress
//! cargo test --test stress -- --nocapture
//! ```
//!
//! # Test Organization
//!
//! - **large_graphs**: Long chains, large rings and wide random DAGs
//! - **registry_load**: Many declaration units registering concurrently

mod large_graphs;
mod registry_load;
