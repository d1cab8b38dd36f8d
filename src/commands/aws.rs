//! Typed arguments for the `aws` CLI calls the pipeline makes.
//!
//! | Struct                      | Command                                |
//! |-----------------------------|----------------------------------------|
//! | `CreateBucketArgs`          | `aws s3api create-bucket`              |
//! | `PutPublicAccessBlockArgs`  | `aws s3api put-public-access-block`    |
//! | `PutBucketPolicyArgs`       | `aws s3api put-bucket-policy`          |
//! | `WebsiteArgs`               | `aws s3 website`                       |
//! | `SyncArgs`                  | `aws s3 sync`                          |
//!
//! Every `aws` call runs with `AWS_PAGER` set to the empty string. The CLI
//! otherwise pipes JSON responses through `less`, which would stall a child
//! that does not own the terminal.

use std::path::Path;

use crate::command_traits::CommandArgs;
use crate::config::bucket_uri;
use crate::error::{DeployError, Result};

const AWS: &str = "aws";

/// Region where S3 rejects an explicit `LocationConstraint`.
const US_EAST_1: &str = "us-east-1";

/// Patterns never uploaded by `aws s3 sync`.
pub const SYNC_EXCLUDES: &[&str] = &[".git/*", ".git", ".last_build_id"];

fn aws_env() -> Vec<(String, String)> {
    vec![("AWS_PAGER".to_string(), String::new())]
}

/// Paths reach the CLI as UTF-8 argv entries; a lossy conversion would name
/// a file that does not exist.
fn utf8_path(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| DeployError::NonUtf8Path(path.to_path_buf()))
}

/// `aws s3api create-bucket`.
///
/// Fails with `BucketAlreadyOwnedByYou` on every run after the first; the
/// pipeline treats any failure of this command as informational.
#[derive(Debug, Clone)]
pub struct CreateBucketArgs {
    pub bucket: String,
    pub region: String,
}

impl CommandArgs for CreateBucketArgs {
    fn program(&self) -> &'static str {
        AWS
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "s3api".to_string(),
            "create-bucket".to_string(),
            "--bucket".to_string(),
            self.bucket.clone(),
            "--region".to_string(),
            self.region.clone(),
        ];
        if self.region != US_EAST_1 {
            args.push("--create-bucket-configuration".to_string());
            args.push(format!("LocationConstraint={}", self.region));
        }
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        aws_env()
    }

    fn step_name(&self) -> &'static str {
        "Creating S3 bucket"
    }
}

/// The four S3 Block Public Access switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    /// Every restriction off, required before a public bucket policy is accepted.
    pub const fn permissive() -> Self {
        Self {
            block_public_acls: false,
            ignore_public_acls: false,
            block_public_policy: false,
            restrict_public_buckets: false,
        }
    }

    /// Shorthand syntax accepted by `--public-access-block-configuration`.
    pub fn to_shorthand(&self) -> String {
        format!(
            "BlockPublicAcls={},IgnorePublicAcls={},BlockPublicPolicy={},RestrictPublicBuckets={}",
            self.block_public_acls,
            self.ignore_public_acls,
            self.block_public_policy,
            self.restrict_public_buckets
        )
    }
}

/// `aws s3api put-public-access-block`.
#[derive(Debug, Clone)]
pub struct PutPublicAccessBlockArgs {
    pub bucket: String,
    pub configuration: PublicAccessBlock,
}

impl CommandArgs for PutPublicAccessBlockArgs {
    fn program(&self) -> &'static str {
        AWS
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "s3api".to_string(),
            "put-public-access-block".to_string(),
            "--bucket".to_string(),
            self.bucket.clone(),
            "--public-access-block-configuration".to_string(),
            self.configuration.to_shorthand(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        aws_env()
    }

    fn step_name(&self) -> &'static str {
        "Unblocking public access"
    }
}

/// `aws s3api put-bucket-policy --policy file://<path>`.
#[derive(Debug, Clone)]
pub struct PutBucketPolicyArgs {
    pub bucket: String,
    /// Local JSON policy document, read by the CLI through `file://`.
    pub policy_path: String,
}

impl PutBucketPolicyArgs {
    pub fn new(bucket: impl Into<String>, policy_path: &Path) -> Result<Self> {
        Ok(Self {
            bucket: bucket.into(),
            policy_path: utf8_path(policy_path)?,
        })
    }
}

impl CommandArgs for PutBucketPolicyArgs {
    fn program(&self) -> &'static str {
        AWS
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "s3api".to_string(),
            "put-bucket-policy".to_string(),
            "--bucket".to_string(),
            self.bucket.clone(),
            "--policy".to_string(),
            format!("file://{}", self.policy_path),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        aws_env()
    }

    fn step_name(&self) -> &'static str {
        "Setting public read policy"
    }
}

/// `aws s3 website`.
#[derive(Debug, Clone)]
pub struct WebsiteArgs {
    pub bucket: String,
    pub index_document: String,
    pub error_document: String,
}

impl CommandArgs for WebsiteArgs {
    fn program(&self) -> &'static str {
        AWS
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "s3".to_string(),
            "website".to_string(),
            format!("{}/", bucket_uri(&self.bucket)),
            "--index-document".to_string(),
            self.index_document.clone(),
            "--error-document".to_string(),
            self.error_document.clone(),
        ]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        aws_env()
    }

    fn step_name(&self) -> &'static str {
        "Enabling static website hosting"
    }
}

/// `aws s3 sync <source> s3://<bucket>`.
#[derive(Debug, Clone)]
pub struct SyncArgs {
    pub source: String,
    pub bucket: String,
    /// Remove remote objects with no local counterpart.
    pub delete: bool,
    pub excludes: Vec<String>,
}

impl SyncArgs {
    /// Mirror `source` into `bucket` with deletion and the default excludes.
    pub fn mirror(source: impl AsRef<Path>, bucket: impl Into<String>) -> Result<Self> {
        Ok(Self {
            source: utf8_path(source.as_ref())?,
            bucket: bucket.into(),
            delete: true,
            excludes: SYNC_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        })
    }
}

impl CommandArgs for SyncArgs {
    fn program(&self) -> &'static str {
        AWS
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![
            "s3".to_string(),
            "sync".to_string(),
            self.source.clone(),
            bucket_uri(&self.bucket),
        ];
        if self.delete {
            args.push("--delete".to_string());
        }
        for pattern in &self.excludes {
            args.push("--exclude".to_string());
            args.push(pattern.clone());
        }
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        aws_env()
    }

    fn step_name(&self) -> &'static str {
        "Uploading to S3"
    }
}
