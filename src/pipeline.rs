//! Deployment pipeline
//!
//! Runs the six steps strictly in order:
//!
//! 1. create the bucket (failure tolerated)
//! 2. turn off Block Public Access
//! 3. attach the public-read bucket policy
//! 4. enable static website hosting
//! 5. rebuild the Flutter web app
//! 6. mirror the build output into the bucket
//!
//! The first fatal error stops the pipeline and is returned to the caller.
//! Nothing already done is rolled back.

use std::io::Write;

use crate::command_runner::CommandRunner;
use crate::commands::aws::{
    CreateBucketArgs, PublicAccessBlock, PutBucketPolicyArgs, PutPublicAccessBlockArgs, SyncArgs,
    WebsiteArgs,
};
use crate::commands::build::{BuildMode, FlutterWebBuildArgs};
use crate::config::DeployConfig;
use crate::deploy_state::{DeployContext, DeployStage};
use crate::error::{DeployError, Result};
use crate::policy::{BucketPolicy, PolicyFile};
use crate::report::Reporter;

/// Summary of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub website_url: String,
    /// `create-bucket` failed and was ignored (usually: bucket already exists)
    pub bucket_creation_skipped: bool,
    /// Stages entered, in order
    pub stages: Vec<DeployStage>,
}

/// Drives one deployment run.
pub struct Deployer<'a, R: CommandRunner + ?Sized, W: Write> {
    config: &'a DeployConfig,
    runner: &'a mut R,
    reporter: Reporter<W>,
    build_mode: BuildMode,
    context: DeployContext,
}

impl<'a, R: CommandRunner + ?Sized, W: Write> Deployer<'a, R, W> {
    pub fn new(config: &'a DeployConfig, runner: &'a mut R, out: W) -> Self {
        Self {
            config,
            runner,
            reporter: Reporter::new(out),
            build_mode: BuildMode::default(),
            context: DeployContext::new(),
        }
    }

    pub fn with_build_mode(mut self, build_mode: BuildMode) -> Self {
        self.build_mode = build_mode;
        self
    }

    /// State of this run; `failed_at()` names the step that stopped it.
    pub fn context(&self) -> &DeployContext {
        &self.context
    }

    /// Run every step. Returns the first fatal error.
    pub fn run(&mut self) -> Result<DeployReport> {
        match self.run_steps() {
            Ok(report) => Ok(report),
            Err(err) => {
                tracing::error!(
                    "Deployment stopped during {}: {}",
                    self.context.current_stage(),
                    err
                );
                if let Err(e) = self.context.fail() {
                    tracing::debug!("Not marking deployment failed: {}", e);
                }
                Err(err)
            }
        }
    }

    fn run_steps(&mut self) -> Result<DeployReport> {
        self.reporter.banner(self.config)?;

        self.enter(DeployStage::CreatingBucket)?;
        let bucket_creation_skipped = !self.create_bucket()?;

        self.enter(DeployStage::UnblockingPublicAccess)?;
        self.unblock_public_access()?;

        self.enter(DeployStage::SettingPolicy)?;
        self.set_public_read_policy()?;

        self.enter(DeployStage::EnablingWebsite)?;
        self.enable_website_hosting()?;

        self.enter(DeployStage::Building)?;
        self.build()?;

        self.enter(DeployStage::Syncing)?;
        self.sync()?;

        self.context.transition_to(DeployStage::Completed)?;
        let website_url = self.config.website_url();
        self.reporter.complete(&website_url)?;
        tracing::info!("Deployment complete: {}", website_url);

        Ok(DeployReport {
            website_url,
            bucket_creation_skipped,
            stages: self
                .context
                .stage_history()
                .iter()
                .map(|(stage, _)| *stage)
                .collect(),
        })
    }

    fn enter(&mut self, stage: DeployStage) -> Result<()> {
        self.context.transition_to(stage)?;
        self.reporter.step(stage)
    }

    /// Returns true if the bucket was created by this run.
    fn create_bucket(&mut self) -> Result<bool> {
        let args = CreateBucketArgs {
            bucket: self.config.bucket_name().to_string(),
            region: self.config.region().to_string(),
        };

        let reason = match self.runner.run(&args) {
            Ok(output) if output.success => return Ok(true),
            Ok(output) => format!("exit code {}", output.exit_code.unwrap_or(-1)),
            Err(e @ DeployError::Interrupted { .. }) => return Err(e),
            Err(e) => e.to_string(),
        };

        tracing::warn!("create-bucket failed ({}), assuming the bucket exists", reason);
        self.reporter.note("Bucket might already exist, continuing...")?;
        Ok(false)
    }

    fn unblock_public_access(&mut self) -> Result<()> {
        let args = PutPublicAccessBlockArgs {
            bucket: self.config.bucket_name().to_string(),
            configuration: PublicAccessBlock::permissive(),
        };
        self.runner.run(&args)?.ensure_success()
    }

    fn set_public_read_policy(&mut self) -> Result<()> {
        let policy = BucketPolicy::public_read(self.config.bucket_name());
        let policy_file = PolicyFile::create(&policy)?;

        let args = PutBucketPolicyArgs::new(self.config.bucket_name(), policy_file.path())?;
        // policy_file is dropped (and deleted) if run() errors
        let output = self.runner.run(&args)?;
        let removed = policy_file.remove();

        output.ensure_success()?;
        removed
    }

    fn enable_website_hosting(&mut self) -> Result<()> {
        let args = WebsiteArgs {
            bucket: self.config.bucket_name().to_string(),
            index_document: self.config.index_document().to_string(),
            error_document: self.config.index_document().to_string(),
        };
        self.runner.run(&args)?.ensure_success()
    }

    fn build(&mut self) -> Result<()> {
        let config = self.config;
        let build_dir = config.build_dir();
        let dry_run = self.runner.is_dry_run();

        if build_dir.exists() {
            if dry_run {
                tracing::info!("Dry run: leaving {} in place", build_dir.display());
            } else {
                tracing::info!("Removing previous build output {}", build_dir.display());
                std::fs::remove_dir_all(build_dir)?;
            }
        }

        let args = FlutterWebBuildArgs {
            mode: self.build_mode,
        };
        let output = self.runner.run(&args)?;
        output.ensure_success()?;

        if !output.dry_run && !build_dir.is_dir() {
            return Err(DeployError::BuildOutputMissing(build_dir.to_path_buf()));
        }
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        let args = SyncArgs::mirror(self.config.build_dir(), self.config.bucket_name())?;
        self.runner.run(&args)?.ensure_success()
    }
}
