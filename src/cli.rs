use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::build::BuildMode;
use crate::config::{
    DEFAULT_BUCKET_NAME, DEFAULT_BUILD_DIR, DEFAULT_INDEX_DOCUMENT, DEFAULT_REGION, DeployConfig,
};

/// s3deploy - publish a Flutter web build as an S3 static website
#[derive(Parser, Debug)]
#[command(name = "s3deploy")]
#[command(about = "Provision an S3 website bucket, build the Flutter web app and sync it")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: print every external command instead of running it.
    ///
    /// The policy file is still written and removed; the build directory
    /// is left untouched.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where and what to deploy
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// AWS region of the bucket
    #[arg(long, global = true, default_value = DEFAULT_REGION)]
    pub region: String,

    /// Bucket name (also the website host name prefix)
    #[arg(long, global = true, default_value = DEFAULT_BUCKET_NAME)]
    pub bucket: String,

    /// Local directory holding the build output
    #[arg(long, global = true, default_value = DEFAULT_BUILD_DIR)]
    pub build_dir: PathBuf,

    /// Document served for `/` and for missing keys
    #[arg(long, global = true, default_value = DEFAULT_INDEX_DOCUMENT)]
    pub index_document: String,
}

impl TargetArgs {
    pub fn to_config(&self) -> DeployConfig {
        DeployConfig::new(&self.region, &self.bucket, &self.build_dir)
            .with_index_document(&self.index_document)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Provision the bucket, build and upload (default)
    Deploy {
        /// Flutter build mode
        #[arg(long, default_value_t = BuildMode::Release)]
        build_mode: BuildMode,
    },
    /// Print the public-read bucket policy JSON
    Policy,
    /// Print the website URL
    Url,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
