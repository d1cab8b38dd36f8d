//! Bucket policy document and its temporary on-disk form.
//!
//! `aws s3api put-bucket-policy` reads the document from a local file
//! (`--policy file://...`). `PolicyFile` owns that file for exactly as long
//! as the apply call needs it and removes it when dropped, so the document
//! never outlives the step, whether the apply succeeds, fails or panics.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::objects_arn;
use crate::error::Result;

/// IAM policy language version understood by S3.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Bucket policy document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketPolicy {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

/// Single statement of a bucket policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub sid: String,
    pub effect: String,
    pub principal: String,
    pub action: String,
    pub resource: String,
}

impl BucketPolicy {
    /// Anyone may `s3:GetObject` any key in `bucket`.
    pub fn public_read(bucket: &str) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![PolicyStatement {
                sid: "PublicReadGetObject".to_string(),
                effect: "Allow".to_string(),
                principal: "*".to_string(),
                action: "s3:GetObject".to_string(),
                resource: objects_arn(bucket),
            }],
        }
    }

    /// Compact JSON, as uploaded.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON for display.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// RAII wrapper for the temporary policy file.
///
/// The file lives in the system temp directory under a unique
/// `s3_policy*.json` name and is deleted when the wrapper is dropped.
/// `remove()` deletes it eagerly and reports failures that `Drop` can only
/// log.
///
/// # Example
///
/// ```
/// use s3deploy::policy::{BucketPolicy, PolicyFile};
///
/// let file = PolicyFile::create(&BucketPolicy::public_read("my-site")).unwrap();
/// let path = file.path().to_path_buf();
/// assert!(path.exists());
///
/// drop(file);
/// assert!(!path.exists());
/// ```
#[derive(Debug)]
pub struct PolicyFile {
    file: NamedTempFile,
}

impl PolicyFile {
    /// Serialize `policy` into a fresh temporary file.
    pub fn create(policy: &BucketPolicy) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("s3_policy")
            .suffix(".json")
            .tempfile()?;

        file.write_all(policy.to_json()?.as_bytes())?;
        file.flush()?;

        tracing::debug!("Policy file created: {}", file.path().display());

        Ok(Self { file })
    }

    /// Path of the policy document on disk.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, surfacing any error.
    pub fn remove(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        tracing::debug!("Policy file removed: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_read_resource() {
        let policy = BucketPolicy::public_read("hercare-app-frontend-cszaiz");
        assert_eq!(policy.statement.len(), 1);
        assert_eq!(
            policy.statement[0].resource,
            "arn:aws:s3:::hercare-app-frontend-cszaiz/*"
        );
    }

    #[test]
    fn test_policy_json_uses_iam_field_names() {
        let json = BucketPolicy::public_read("site").to_json().expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");

        assert_eq!(value["Version"], "2012-10-17");
        let statement = &value["Statement"][0];
        assert_eq!(statement["Sid"], "PublicReadGetObject");
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Principal"], "*");
        assert_eq!(statement["Action"], "s3:GetObject");
        assert_eq!(statement["Resource"], "arn:aws:s3:::site/*");
    }

    #[test]
    fn test_policy_file_contains_document() {
        let policy = BucketPolicy::public_read("site");
        let file = PolicyFile::create(&policy).expect("create policy file");

        let contents = std::fs::read_to_string(file.path()).expect("read policy file");
        let parsed: BucketPolicy = serde_json::from_str(&contents).expect("parse");
        assert_eq!(parsed, policy);

        let name = file.path().file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("s3_policy"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_policy_file_remove_deletes_file() {
        let file = PolicyFile::create(&BucketPolicy::public_read("site")).expect("create");
        let path = file.path().to_path_buf();

        file.remove().expect("remove");
        assert!(!path.exists());
    }

    #[test]
    fn test_policy_file_deleted_on_panic() {
        let path = std::sync::Arc::new(std::sync::Mutex::new(None));
        let seen = path.clone();

        let result = std::panic::catch_unwind(move || {
            let file = PolicyFile::create(&BucketPolicy::public_read("site")).expect("create");
            *seen.lock().expect("lock") = Some(file.path().to_path_buf());
            panic!("apply blew up");
        });

        assert!(result.is_err());
        let path = path.lock().expect("lock").clone().expect("path recorded");
        assert!(!path.exists(), "policy file must not survive a panic");
    }
}
