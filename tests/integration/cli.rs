//! Every command through the `stackgraph` binary.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;

use stackgraph::test_utils::TemplateFixture;

use crate::common::{TestProject, lines};

#[test]
fn test_order_creation_and_deletion() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.write_fixture(&TemplateFixture::linear_chain())?;
    let file = path.to_str().unwrap_or_default();

    let output = project.run(&["order", file])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert_eq!(lines(&output.stdout), vec!["Network", "Subnet", "Instance"]);

    let output = project.run(&["order", file, "--deletion"])?;
    assert_eq!(lines(&output.stdout), vec!["Instance", "Subnet", "Network"]);
    Ok(())
}

#[test]
fn test_order_json() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.write_fixture(&TemplateFixture::linear_chain())?;

    let output = project.run(&["order", path.to_str().unwrap_or_default(), "--json"])?;
    let json: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(json["direction"], "creation");
    assert_eq!(json["order"], serde_json::json!(["Network", "Subnet", "Instance"]));
    Ok(())
}

#[test]
fn test_order_fails_on_cycle() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = TemplateFixture::two_node_cycle().write_to(temp.path()).unwrap();

    Command::cargo_bin("stackgraph")
        .unwrap()
        .env("NO_COLOR", "1")
        .arg("order")
        .arg(&path)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Circular dependency detected: [A, B]"))
        .stderr(predicate::str::contains("Break the cycle"));
}

#[test]
fn test_validate_reports_unresolved_reference() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = TemplateFixture::unresolved_reference().write_to(temp.path()).unwrap();

    Command::cargo_bin("stackgraph")
        .unwrap()
        .env("NO_COLOR", "1")
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("NoSuchResource"))
        .stderr(predicate::str::contains("Properties.KmsMasterKeyId"));
}

#[test]
fn test_validate_success_and_catalog() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.write_fixture(&TemplateFixture::linear_chain())?;
    let file = path.to_str().unwrap_or_default();

    let output = project.run(&["validate", file])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("3 resource(s), 2 dependency edge(s)"));

    project.write("catalog.json", r#"{"AWS::EC2::VPC": ["CidrBlok"]}"#)?;
    let output = project.run(&["validate", file, "--catalog", "catalog.json"])?;
    assert!(!output.success);
    assert!(output.stderr.contains("Network (AWS::EC2::VPC) has unknown property 'CidrBlock'"));
    assert!(output.stderr.contains("did you mean 'CidrBlok'"));
    Ok(())
}

#[test]
fn test_graph_tree() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.write_fixture(&TemplateFixture::linear_chain())?;
    let file = path.to_str().unwrap_or_default();

    let output = project.run(&["graph", file])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert_eq!(output.stdout, "Instance\n└── Subnet\n    └── Network\n");

    let output = project.run(&["graph", file, "--root", "Subnet"])?;
    assert_eq!(output.stdout, "Subnet\n└── Network\n");

    let output = project.run(&["graph", file, "--root", "Missing"])?;
    assert!(!output.success);
    assert!(output.stderr.contains("Resource 'Missing' not found"));
    Ok(())
}

#[test]
fn test_graph_shows_cycles() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.write_fixture(&TemplateFixture::two_node_cycle())?;

    let output = project.run(&["graph", path.to_str().unwrap_or_default()])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("B (circular reference)") || output.stdout.contains("A (circular reference)"));
    assert!(output.stdout.contains("cycle: [A, B]"));
    Ok(())
}

#[test]
fn test_import_report() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.write_fixture(&TemplateFixture::implicit_bucket_policy())?;
    let file = path.to_str().unwrap_or_default();

    let output = project.run(&["import", file, "--json"])?;
    assert!(output.success, "stderr: {}", output.stderr);
    let report: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(report["resources"], 2);
    assert_eq!(report["recovered"][0]["from"], "Policy");
    assert_eq!(report["recovered"][0]["to"], "Bucket");

    let output = project.run(&["import", file])?;
    assert!(output.stdout.contains("Recovered dependencies:"));
    assert!(output.stdout.contains("Policy -> Bucket"));

    let output = project.run(&["import", file, "--json", "--no-recovery"])?;
    let report: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(report["recovered"], serde_json::json!([]));
    Ok(())
}

#[test]
fn test_import_respects_config() -> Result<()> {
    let project = TestProject::new()?;
    project.write_config("[recovery]\nenabled = false\n")?;
    let path = project.write_fixture(&TemplateFixture::implicit_bucket_policy())?;

    let output = project.run(&["import", path.to_str().unwrap_or_default(), "--json"])?;
    assert!(output.success, "stderr: {}", output.stderr);
    let report: serde_json::Value = serde_json::from_str(&output.stdout)?;
    assert_eq!(report["recovered"], serde_json::json!([]));
    Ok(())
}

#[test]
fn test_import_tolerates_cycles() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.write_fixture(&TemplateFixture::two_node_cycle())?;

    let output = project.run(&["import", path.to_str().unwrap_or_default()])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("cycle A, B"));
    assert!(output.stdout.contains("A -> B (forward)"));
    Ok(())
}

#[test]
fn test_build_merges_files() -> Result<()> {
    let project = TestProject::new()?;
    project.write(
        "network.yaml",
        "Parameters:\n  Cidr:\n    Type: String\nResources:\n  Network:\n    Type: AWS::EC2::VPC\n    Properties:\n      CidrBlock: !Ref Cidr\n",
    )?;
    project.write(
        "compute.yaml",
        "Resources:\n  Instance:\n    Type: AWS::EC2::Instance\n    Properties:\n      VpcId: !Ref Network\n",
    )?;

    let output = project.run(&["build", "compute.yaml", "network.yaml", "--output", "stack.json"])?;
    assert!(output.success, "stderr: {}", output.stderr);

    let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(project.path("stack.json"))?)?;
    let ids: Vec<&String> = document["Resources"].as_object().map(|r| r.keys().collect()).unwrap_or_default();
    assert_eq!(ids, vec!["Network", "Instance"]);
    assert!(document["Parameters"]["Cidr"].is_object());

    let output = project.run(&["build", "network.yaml", "compute.yaml", "--yaml"])?;
    assert!(output.success, "stderr: {}", output.stderr);
    assert!(output.stdout.contains("Resources:"));
    Ok(())
}

#[test]
fn test_build_rejects_duplicate_resources() -> Result<()> {
    let project = TestProject::new()?;
    let fixture = TemplateFixture::linear_chain();
    project.write("one.yaml", &fixture.content)?;
    project.write("two.yaml", &fixture.content)?;

    let output = project.run(&["build", "one.yaml", "two.yaml"])?;
    assert!(!output.success);
    assert!(output.stderr.contains("declared in more than one file"));
    Ok(())
}

#[test]
fn test_parse_error_exit_code() -> Result<()> {
    let project = TestProject::new()?;
    let path = project.write_fixture(&TemplateFixture::invalid_syntax())?;

    let output = project.run(&["order", path.to_str().unwrap_or_default()])?;
    assert!(!output.success);
    assert_eq!(output.code, Some(1));
    assert!(output.stderr.contains("invalid_syntax.yaml"));
    Ok(())
}
