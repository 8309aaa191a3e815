//! Command-line interface for stackgraph.
//!
//! The CLI is thin glue over the library: every command reads one or more template
//! files, runs a library operation and prints the result.
//!
//! # Commands
//!
//! - `order` - Creation (or `--deletion`) order of a template's resources
//! - `graph` - Dependency tree of a template, for every resource or one `--root`
//! - `import` - Recovered dependencies and cycle-tolerant emission groups
//! - `validate` - References, cycles and (optionally) property names
//! - `build` - Merge several templates into one ordered document
//!
//! # Global Options
//!
//! - `--verbose` / `-v`: debug logging
//! - `--quiet` / `-q`: errors only
//! - `--config` / `-c`: configuration file (see [`crate::config`])
//!
//! # Example
//!
//! ```bash
//! stackgraph order stack.yaml
//! stackgraph --verbose import legacy.json --json
//! stackgraph build network.yaml compute.yaml --output stack.json
//! ```

mod build;
mod common;
mod graph;
mod import;
mod order;
mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Runtime configuration for CLI execution.
///
/// Built from the global flags once, then handed to the subcommand.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter directive; `None` keeps `RUST_LOG` (or `warn`).
    pub log_level: Option<String>,

    /// Configuration file given with `--config`.
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global tracing subscriber.
    ///
    /// Safe to call more than once; only the first call installs a subscriber.
    pub fn init_logging(&self) {
        let filter = match &self.log_level {
            Some(level) => EnvFilter::new(level),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Reference graph engine for infrastructure templates.
#[derive(Parser)]
#[command(
    name = "stackgraph",
    about = "Dependency ordering, cycle detection and import for infrastructure templates",
    version,
    long_about = "stackgraph derives the dependency graph of an infrastructure template from its references, orders resources for creation and deletion, and detects cycles."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file (default: ~/.stackgraph/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print resources in creation or deletion order
    Order(order::OrderCommand),

    /// Show the dependency tree of a template
    Graph(graph::GraphCommand),

    /// Recover dependencies and emission groups from an existing template
    Import(import::ImportCommand),

    /// Check references, cycles and property names
    Validate(validate::ValidateCommand),

    /// Merge templates into one ordered document
    Build(build::BuildCommand),
}

impl Cli {
    /// Execute the selected command with configuration from the global flags.
    ///
    /// # Errors
    ///
    /// Returns any error from configuration loading or the command itself.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            None
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns any error from configuration loading or the command itself.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Order(cmd) => cmd.execute().await,
            Commands::Graph(cmd) => cmd.execute().await,
            Commands::Import(cmd) => cmd.execute(config.config_path).await,
            Commands::Validate(cmd) => cmd.execute().await,
            Commands::Build(cmd) => cmd.execute().await,
        }
    }
}
