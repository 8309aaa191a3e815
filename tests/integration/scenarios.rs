//! Reference graph scenarios through the public API.

use stackgraph::config::RecoveryConfig;
use stackgraph::core::StackError;
use stackgraph::graph::{
    EdgeKind, ExpectedTarget, GraphBuilder, creation_order, deletion_order, detect_cycles,
    emission_order, find_sccs,
};
use stackgraph::refs;
use stackgraph::template::{DocumentFormat, Resource, Template, resource_set, to_document};
use stackgraph::test_utils::{TemplateFixture, init_test_logging};

#[test]
fn test_linear_chain_orders() {
    init_test_logging(None);
    let template = TemplateFixture::linear_chain().parse().unwrap();
    let graph = GraphBuilder::for_template(&template).build().unwrap();

    assert_eq!(creation_order(&graph).unwrap(), vec!["Network", "Subnet", "Instance"]);
    assert_eq!(deletion_order(&graph).unwrap(), vec!["Instance", "Subnet", "Network"]);
    assert_eq!(graph.edge_kind("Subnet", "Network"), Some(EdgeKind::Reference));
}

#[test]
fn test_two_node_cycle() {
    init_test_logging(None);
    let template = TemplateFixture::two_node_cycle().parse().unwrap();
    let graph = GraphBuilder::for_template(&template).build().unwrap();

    let sccs = find_sccs(&graph);
    assert_eq!(sccs.len(), 1);
    assert_eq!(sccs[0].members(), ["A", "B"]);

    let err = creation_order(&graph).unwrap_err();
    assert!(matches!(err, StackError::CircularDependency { .. }));
    assert_eq!(err.cycle_members(), vec!["A", "B"]);
    assert!(deletion_order(&graph).is_err());

    let groups = emission_order(&graph);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members, vec!["A", "B"]);
    assert_eq!(groups[0].forward_reference_count(), 1);
}

#[test]
fn test_heuristic_recovery_adds_edge() {
    init_test_logging(None);
    let template = TemplateFixture::implicit_bucket_policy().parse().unwrap();

    let plain = GraphBuilder::for_template(&template).build().unwrap();
    assert!(plain.dependencies("Policy").is_empty());

    let config = RecoveryConfig::default();
    let recovered = GraphBuilder::for_template(&template).with_recovery(&config).build().unwrap();
    assert_eq!(recovered.dependencies("Policy"), vec!["Bucket"]);
    assert_eq!(recovered.edge_kind("Policy", "Bucket"), Some(EdgeKind::Recovered));
    assert_eq!(recovered.recovered_edges(), vec![("Policy", "Bucket")]);
    assert_eq!(creation_order(&recovered).unwrap(), vec!["Bucket", "Policy"]);
}

#[test]
fn test_recovered_edge_closing_cycle_is_forward_reference() {
    init_test_logging(None);
    let yaml = r#"
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    Properties:
      BucketName: !Sub "${AWS::StackName}-data"
      Tags:
        - Key: policy
          Value: !Ref Policy
  Policy:
    Type: AWS::IAM::ManagedPolicy
    Properties:
      PolicyDocument:
        Statement:
          - Effect: Allow
            Action: s3:ListBucket
            Resource: !Sub "arn:${AWS::Partition}:s3:::${AWS::StackName}-data"
"#;
    let template = Template::parse(yaml.as_bytes(), DocumentFormat::Yaml).unwrap();

    let plain = GraphBuilder::for_template(&template).build().unwrap();
    assert_eq!(creation_order(&plain).unwrap(), vec!["Policy", "Bucket"]);

    let config = RecoveryConfig::default();
    let graph = GraphBuilder::for_template(&template).with_recovery(&config).build().unwrap();
    assert_eq!(graph.edge_kind("Bucket", "Policy"), Some(EdgeKind::Reference));
    assert_eq!(graph.edge_kind("Policy", "Bucket"), Some(EdgeKind::Recovered));
    assert!(creation_order(&graph).is_err());

    let groups = emission_order(&graph);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].members, vec!["Bucket", "Policy"]);
    assert_eq!(groups[0].forward_reference_count(), 1);
    assert_eq!(
        groups[0].forward_references.get("Bucket").map(|deps| deps.iter().cloned().collect::<Vec<_>>()),
        Some(vec!["Policy".to_string()])
    );
}

#[test]
fn test_ambiguous_recovery_is_a_warning() {
    let yaml = r#"
Resources:
  First:
    Type: AWS::S3::Bucket
    Properties:
      BucketName: shared-name
  Second:
    Type: AWS::S3::Bucket
    Properties:
      BucketName: shared-name
  Reader:
    Type: AWS::IAM::ManagedPolicy
    Properties:
      Resource: !Sub "arn:${AWS::Partition}:s3:::shared-name"
"#;
    let template = Template::parse(yaml.as_bytes(), DocumentFormat::Yaml).unwrap();
    let config = RecoveryConfig::default();
    let graph = GraphBuilder::for_template(&template).with_recovery(&config).build().unwrap();

    assert!(graph.dependencies("Reader").is_empty());
    assert_eq!(graph.warnings().len(), 1);
    assert_eq!(graph.warnings()[0].candidates, vec!["First", "Second"]);
}

#[test]
fn test_unresolved_reference_names_source_path_and_target() {
    let template = TemplateFixture::unresolved_reference().parse().unwrap();
    let err = GraphBuilder::for_template(&template).build().unwrap_err();

    let StackError::UnresolvedReferences {
        references,
    } = &err
    else {
        panic!("expected unresolved references");
    };
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].source, "A");
    assert_eq!(references[0].path, "Properties.KmsMasterKeyId");
    assert_eq!(references[0].target, "NoSuchResource");
    assert_eq!(references[0].expected, ExpectedTarget::ResourceOrParameter);

    let message = err.to_string();
    assert!(message.contains("NoSuchResource"));
    assert!(message.contains("Properties.KmsMasterKeyId"));
}

#[test]
fn test_serialization_is_idempotent() {
    let resources = resource_set([
        Resource::builder("Network", "AWS::EC2::VPC").property("CidrBlock", "10.0.0.0/16").build(),
        Resource::builder("Subnet", "AWS::EC2::Subnet")
            .property("VpcId", refs::reference("Network"))
            .property("AvailabilityZone", refs::sub("${AWS::Region}a"))
            .build(),
    ]);
    let order = vec!["Network".to_string(), "Subnet".to_string()];

    let first = to_document(&resources, &order).unwrap();
    let second = to_document(&resources, &order).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.resource_ids(), vec!["Network", "Subnet"]);
}

#[test]
fn test_serializer_rejects_non_permutation() {
    let resources = resource_set([
        Resource::builder("A", "AWS::SNS::Topic").build(),
        Resource::builder("B", "AWS::SNS::Topic").build(),
    ]);
    for order in [vec!["A"], vec!["A", "B", "B"], vec!["A", "C"]] {
        let order: Vec<String> = order.into_iter().map(str::to_string).collect();
        assert!(matches!(to_document(&resources, &order), Err(StackError::InvalidOrder { .. })));
    }
}

#[test]
fn test_full_stack_graph() {
    let template = TemplateFixture::full_stack().parse().unwrap();
    let graph = GraphBuilder::for_template(&template).build().unwrap();

    assert_eq!(graph.dependencies("Jobs"), vec!["DeadLetters"]);
    assert_eq!(graph.dependencies("Worker"), vec!["Jobs", "Logs", "WorkerRole"]);
    assert_eq!(graph.edge_kind("Worker", "Logs"), Some(EdgeKind::DependsOn));
    assert_eq!(graph.dependencies("Alarm"), vec!["Worker"]);
    assert!(graph.parameter_references("Jobs").contains("Environment"));
    assert!(detect_cycles(&graph).is_empty());

    let order = creation_order(&graph).unwrap();
    let position = |id: &str| order.iter().position(|o| o == id).unwrap();
    assert!(position("DeadLetters") < position("Jobs"));
    assert!(position("Jobs") < position("Worker"));
    assert!(position("Worker") < position("Alarm"));
}
