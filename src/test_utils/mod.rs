//! Test utilities for stackgraph
//!
//! Shared helpers for unit tests and the integration and stress suites. Available
//! under `#[cfg(test)]` and with the `test-utils` feature.
//!
//! - [`init_test_logging`] - one-time tracing setup
//! - [`TemplateFixture`] - documents for the standard graph shapes
//! - [`chain`] and [`ring`] - generated resource sets of any size

pub mod fixtures;

pub use fixtures::{TemplateFixture, chain, chain_id, ring};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` if given, else `RUST_LOG`; with
/// neither, logging stays off.
///
/// ```rust,no_run
/// use tracing::Level;
///
/// stackgraph::test_utils::init_test_logging(Some(Level::DEBUG));
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
