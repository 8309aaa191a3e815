//! Template fixtures for tests.
//!
//! Each fixture is a small document exercising one graph shape. Fixtures can be parsed
//! in memory with [`TemplateFixture::parse`] or written to disk for CLI tests with
//! [`TemplateFixture::write_to`].

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::refs::{self, LogicalId};
use crate::template::{DocumentFormat, Resource, ResourceSet, Template, resource_set};

/// A template document with a file name.
#[derive(Clone, Debug)]
pub struct TemplateFixture {
    pub name: String,
    pub file_name: String,
    pub format: DocumentFormat,
    pub content: String,
}

impl TemplateFixture {
    fn yaml(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: format!("{name}.yaml"),
            format: DocumentFormat::Yaml,
            content: content.trim().to_string(),
        }
    }

    fn json(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            file_name: format!("{name}.json"),
            format: DocumentFormat::Json,
            content: content.trim().to_string(),
        }
    }

    /// `Network` ← `Subnet` ← `Instance`.
    pub fn linear_chain() -> Self {
        Self::yaml(
            "linear_chain",
            r#"
Resources:
  Instance:
    Type: AWS::EC2::Instance
    Properties:
      SubnetId: !Ref Subnet
  Network:
    Type: AWS::EC2::VPC
    Properties:
      CidrBlock: 10.0.0.0/16
  Subnet:
    Type: AWS::EC2::Subnet
    Properties:
      VpcId: !Ref Network
"#,
        )
    }

    /// `A` and `B` reference each other through `Fn::GetAtt`.
    pub fn two_node_cycle() -> Self {
        Self::json(
            "two_node_cycle",
            r#"
{
  "Resources": {
    "A": {"Type": "AWS::IAM::Role", "Properties": {"Peer": {"Fn::GetAtt": ["B", "Arn"]}}},
    "B": {"Type": "AWS::IAM::Role", "Properties": {"Peer": {"Fn::GetAtt": ["A", "Arn"]}}}
  }
}
"#,
        )
    }

    /// `Policy` names `Bucket` only through an ARN string.
    pub fn implicit_bucket_policy() -> Self {
        Self::yaml(
            "implicit_bucket_policy",
            r#"
Resources:
  Bucket:
    Type: AWS::S3::Bucket
    Properties:
      BucketName: !Sub "${AWS::StackName}-artifacts"
  Policy:
    Type: AWS::IAM::ManagedPolicy
    Properties:
      PolicyDocument:
        Version: "2012-10-17"
        Statement:
          - Effect: Allow
            Action: s3:GetObject
            Resource: !Sub "arn:${AWS::Partition}:s3:::${AWS::StackName}-artifacts/*"
"#,
        )
    }

    /// `A` references a resource that does not exist.
    pub fn unresolved_reference() -> Self {
        Self::yaml(
            "unresolved_reference",
            r#"
Resources:
  A:
    Type: AWS::SNS::Topic
    Properties:
      KmsMasterKeyId: !Ref NoSuchResource
"#,
        )
    }

    /// Parameters, conditions, outputs and every reference form.
    pub fn full_stack() -> Self {
        Self::yaml(
            "full_stack",
            r#"
AWSTemplateFormatVersion: "2010-09-09"
Description: Queue worker stack
Parameters:
  Environment:
    Type: String
    AllowedValues: [dev, prod]
  RetentionDays:
    Type: Number
    Default: 7
Conditions:
  IsProd: !Equals [!Ref Environment, prod]
Resources:
  DeadLetters:
    Type: AWS::SQS::Queue
    Properties:
      MessageRetentionPeriod: 1209600
  Jobs:
    Type: AWS::SQS::Queue
    Properties:
      QueueName: !Sub "${Environment}-jobs"
      RedrivePolicy:
        deadLetterTargetArn: !GetAtt DeadLetters.Arn
        maxReceiveCount: 5
  Logs:
    Type: AWS::Logs::LogGroup
    Properties:
      RetentionInDays: !Ref RetentionDays
  WorkerRole:
    Type: AWS::IAM::Role
    Properties:
      AssumeRolePolicyDocument:
        Statement:
          - Effect: Allow
            Principal: {Service: lambda.amazonaws.com}
            Action: sts:AssumeRole
  Worker:
    Type: AWS::Lambda::Function
    DependsOn: Logs
    Properties:
      Role: !GetAtt WorkerRole.Arn
      Environment:
        Variables:
          QUEUE_URL: !Ref Jobs
          STAGE: !If [IsProd, production, development]
  Alarm:
    Type: AWS::CloudWatch::Alarm
    Condition: IsProd
    Properties:
      Dimensions:
        - Name: FunctionName
          Value: !Ref Worker
Outputs:
  QueueUrl:
    Value: !Ref Jobs
    Export:
      Name: !Sub "${AWS::StackName}-queue"
"#,
        )
    }

    /// Malformed YAML.
    pub fn invalid_syntax() -> Self {
        Self::yaml(
            "invalid_syntax",
            r#"
Resources:
  Broken:
    Type: [AWS::S3::Bucket
"#,
        )
    }

    pub fn parse(&self) -> Result<Template> {
        Template::parse(self.content.as_bytes(), self.format)
            .with_context(|| format!("Failed to parse fixture {}", self.name))
    }

    /// Write the document into `dir` under its file name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.content)?;
        Ok(path)
    }
}

/// `R0000` ← `R0001` ← ... ← `R{len-1}`, each resource referencing its predecessor.
pub fn chain(len: usize) -> ResourceSet {
    resource_set((0..len).map(|i| {
        let builder = Resource::builder(chain_id(i), "AWS::SNS::Topic");
        if i == 0 {
            builder.build()
        } else {
            builder.property("Previous", refs::reference(chain_id(i - 1))).build()
        }
    }))
}

/// A single cycle through `len` resources: each references the next, the last the first.
pub fn ring(len: usize) -> ResourceSet {
    resource_set((0..len).map(|i| {
        Resource::builder(chain_id(i), "AWS::SNS::Topic")
            .property("Next", refs::reference(chain_id((i + 1) % len)))
            .build()
    }))
}

/// Zero-padded id so lexical and numeric order agree.
pub fn chain_id(i: usize) -> LogicalId {
    format!("R{i:05}")
}
