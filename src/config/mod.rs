//! Configuration management for stackgraph
//!
//! stackgraph reads one optional TOML file. Everything in it has a default, so a missing
//! file is the same as an empty one.
//!
//! # Location
//!
//! 1. `--config <path>` on the command line
//! 2. `STACKGRAPH_CONFIG` environment variable
//! 3. Default path:
//!    - Unix/macOS: `~/.stackgraph/config.toml`
//!    - Windows: `%LOCALAPPDATA%\stackgraph\config.toml`
//!
//! An explicitly named file must exist; the default file may be absent.
//!
//! # Format
//!
//! ```toml
//! [recovery]
//! enabled = true
//!
//! [recovery.name_properties]
//! "Custom::Store" = "StoreName"
//!
//! [recovery.arn_templates]
//! "Custom::Store" = ["arn:${AWS::Partition}:store:::{name}"]
//! ```

mod recovery;

pub use recovery::RecoveryConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::core::StackError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "STACKGRAPH_CONFIG";

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackgraphConfig {
    /// Heuristic dependency recovery for imported templates.
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

impl StackgraphConfig {
    /// Load from `path`, else `STACKGRAPH_CONFIG`, else the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read, or if any file that
    /// is read is not valid configuration TOML.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(&path).await;
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR)
            && !env_path.is_empty()
        {
            return Self::load_from(Path::new(&env_path)).await;
        }

        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path).await
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid configuration TOML.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .map_err(StackError::from)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .recovery
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Platform default location of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home (or local data) directory cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("stackgraph")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".stackgraph")
        };

        Ok(config_dir.join("config.toml"))
    }
}
