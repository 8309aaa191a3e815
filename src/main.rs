//! stackgraph CLI entry point
//!
//! Parses the command line, runs the command and prints failures through
//! [`user_friendly_error`] before exiting with status 1.
//!
//! Commands:
//! - `order` - Creation or deletion order of a template's resources
//! - `graph` - Dependency tree of a template
//! - `import` - Recovered dependencies and emission groups of an existing template
//! - `validate` - Reference, cycle and property-name checks
//! - `build` - Merge templates into one ordered document

use anyhow::Result;
use clap::Parser;
use stackgraph::cli;
use stackgraph::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Set up colored output for Windows
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
