//! Deployment configuration
//!
//! `DeployConfig` is built once at startup (from CLI flags, falling back to
//! the defaults below) and handed to the pipeline by reference. Nothing in
//! the crate mutates it afterwards.

use std::path::{Path, PathBuf};

/// Region the bucket is created in when `--region` is not given.
pub const DEFAULT_REGION: &str = "ap-south-1";

/// Bucket name used when `--bucket` is not given.
pub const DEFAULT_BUCKET_NAME: &str = "hercare-app-frontend-cszaiz";

/// Directory `flutter build web` writes its assets to.
pub const DEFAULT_BUILD_DIR: &str = "build/web";

/// Served for `/` and for every missing key (single-page app routing).
pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";

/// `s3://<bucket>`, the URI the `aws s3` commands address a bucket by.
pub fn bucket_uri(bucket: &str) -> String {
    format!("s3://{}", bucket)
}

/// ARN matching every object in `bucket`, the public-read policy resource.
pub fn objects_arn(bucket: &str) -> String {
    format!("arn:aws:s3:::{}/*", bucket)
}

/// Immutable deployment settings shared by every pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    region: String,
    bucket_name: String,
    build_dir: PathBuf,
    index_document: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REGION, DEFAULT_BUCKET_NAME, DEFAULT_BUILD_DIR)
    }
}

impl DeployConfig {
    /// Create a configuration with the default index document.
    pub fn new(
        region: impl Into<String>,
        bucket_name: impl Into<String>,
        build_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            region: region.into(),
            bucket_name: bucket_name.into(),
            build_dir: build_dir.into(),
            index_document: DEFAULT_INDEX_DOCUMENT.to_string(),
        }
    }

    /// Replace the document used as both index and error page.
    pub fn with_index_document(mut self, index_document: impl Into<String>) -> Self {
        self.index_document = index_document.into();
        self
    }

    #[inline]
    pub fn region(&self) -> &str {
        &self.region
    }

    #[inline]
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    #[inline]
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    #[inline]
    pub fn index_document(&self) -> &str {
        &self.index_document
    }

    /// Public website endpoint for the bucket.
    ///
    /// Uses the dash-free `s3-website.<region>` form for every region.
    pub fn website_url(&self) -> String {
        format!(
            "http://{}.s3-website.{}.amazonaws.com",
            self.bucket_name, self.region
        )
    }
}
