//! Configuration discovery and its effect on import.

use anyhow::Result;
use serial_test::serial;

use stackgraph::config::{CONFIG_ENV_VAR, StackgraphConfig};
use stackgraph::import::import_template;
use stackgraph::template::DocumentFormat;

use crate::common::TestProject;

/// Restores the environment variable when dropped.
struct EnvGuard {
    previous: Option<String>,
}

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        let previous = std::env::var(CONFIG_ENV_VAR).ok();
        // SAFETY: tests touching the environment run under #[serial].
        unsafe { std::env::set_var(CONFIG_ENV_VAR, value) };
        Self {
            previous,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see EnvGuard::set.
        unsafe {
            match &self.previous {
                Some(value) => std::env::set_var(CONFIG_ENV_VAR, value),
                None => std::env::remove_var(CONFIG_ENV_VAR),
            }
        }
    }
}

#[tokio::test]
#[serial]
async fn test_env_var_names_config_file() -> Result<()> {
    let project = TestProject::new()?;
    project.write_config("[recovery]\nenabled = false\n")?;
    let _guard = EnvGuard::set(&project.config_path);

    let config = StackgraphConfig::load_with_optional(None).await?;
    assert!(!config.recovery.enabled);
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_explicit_path_beats_env_var() -> Result<()> {
    let project = TestProject::new()?;
    project.write_config("[recovery]\nenabled = false\n")?;
    let explicit = project.write("explicit.toml", "[recovery]\nenabled = true\n")?;
    let _guard = EnvGuard::set(&project.config_path);

    let config = StackgraphConfig::load_with_optional(Some(explicit)).await?;
    assert!(config.recovery.enabled);
    Ok(())
}

#[tokio::test]
#[serial]
async fn test_env_var_pointing_nowhere_is_an_error() -> Result<()> {
    let project = TestProject::new()?;
    let _guard = EnvGuard::set(&project.path("missing.toml"));

    let err = StackgraphConfig::load_with_optional(None).await.unwrap_err();
    assert!(err.to_string().contains("missing.toml"));
    Ok(())
}

#[tokio::test]
async fn test_unknown_section_is_rejected() -> Result<()> {
    let project = TestProject::new()?;
    project.write_config("[recovery]\nenabled = true\n\n[sources]\ncommunity = \"x\"\n")?;
    assert!(StackgraphConfig::load_from(&project.config_path).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_custom_name_property_drives_recovery() -> Result<()> {
    let project = TestProject::new()?;
    project.write_config(
        r#"
[recovery.name_properties]
"Custom::Store" = "StoreName"

[recovery.arn_templates]
"Custom::Store" = ["arn:${AWS::Partition}:store:::{name}"]
"#,
    )?;
    let config = StackgraphConfig::load_from(&project.config_path).await?;

    let yaml = r#"
Resources:
  Store:
    Type: Custom::Store
    Properties:
      StoreName: !Sub "${AWS::StackName}-store"
  Client:
    Type: AWS::Lambda::Function
    Properties:
      Environment:
        Variables:
          STORE_ARN: !Sub "arn:${AWS::Partition}:store:::${AWS::StackName}-store"
"#;
    let imported = import_template(yaml.as_bytes(), DocumentFormat::Yaml, &config.recovery)?;
    assert_eq!(imported.graph.recovered_edges(), vec![("Client", "Store")]);
    assert_eq!(imported.emission_sequence(), vec!["Store", "Client"]);

    let imported = import_template(yaml.as_bytes(), DocumentFormat::Yaml, &Default::default())?;
    assert!(imported.graph.recovered_edges().is_empty());
    Ok(())
}

#[test]
fn test_cli_rejects_broken_config() -> Result<()> {
    let project = TestProject::new()?;
    project.write_config("[recovery\n")?;
    let path = project.write("stack.yaml", "Resources:\n  A:\n    Type: AWS::SNS::Topic\n")?;

    let output = project.run(&["import", path.to_str().unwrap_or_default()])?;
    assert!(!output.success);
    assert!(output.stderr.contains("Failed to parse config"));
    assert!(output.stderr.contains("Check the configuration file"));

    project.write_config("[recovery.arn_templates]\n\"Custom::Store\" = [\"arn:aws:store:::fixed\"]\n")?;
    let output = project.run(&["import", path.to_str().unwrap_or_default()])?;
    assert!(!output.success);
    assert!(output.stderr.contains("has no {name} placeholder"));
    Ok(())
}
