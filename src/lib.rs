//! s3deploy Library
//!
//! Provisions an S3 bucket for public static-website hosting, builds a
//! Flutter web client and mirrors the build output into the bucket.

pub mod cli;
pub mod command_runner;
pub mod command_traits;
pub mod commands;
pub mod config;
pub mod deploy_state;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod process_guard;
pub mod report;

// Re-export main types for convenience
pub use command_runner::{CommandOutput, CommandRunner, SystemRunner};
pub use command_traits::CommandArgs;
pub use config::DeployConfig;
pub use deploy_state::{DeployContext, DeployStage, DeployTransitionError};
pub use error::DeployError;
pub use pipeline::{DeployReport, Deployer};
pub use policy::{BucketPolicy, PolicyFile};
