//! Shared fixtures: a `CommandRunner` that records calls instead of spawning.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use s3deploy::{
    CommandArgs, CommandOutput, CommandRunner, DeployConfig, DeployError, DeployReport,
    DeployStage, Deployer,
};
use tempfile::TempDir;

pub const CREATE_BUCKET: &str = "Creating S3 bucket";
pub const UNBLOCK: &str = "Unblocking public access";
pub const SET_POLICY: &str = "Setting public read policy";
pub const WEBSITE: &str = "Enabling static website hosting";
pub const BUILD: &str = "Building Flutter web app";
pub const SYNC: &str = "Uploading to S3";

/// Every step label in pipeline order.
pub const ALL_STEPS: [&str; 6] = [CREATE_BUCKET, UNBLOCK, SET_POLICY, WEBSITE, BUILD, SYNC];

#[derive(Debug, Clone)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub step: String,
}

/// What the fake saw when `put-bucket-policy` ran.
#[derive(Debug, Clone)]
pub struct PolicySeen {
    pub path: PathBuf,
    pub existed: bool,
    pub contents: String,
}

/// Records every command; fails the steps it is told to fail.
#[derive(Debug)]
pub struct RecordingRunner {
    pub calls: Vec<Call>,
    /// step label -> exit code (None = killed by signal)
    pub fail_steps: HashMap<&'static str, Option<i32>>,
    /// steps whose program "is not installed"
    pub missing_program_steps: Vec<&'static str>,
    /// step during which a termination signal "arrives"
    pub interrupt_at: Option<&'static str>,
    /// `flutter build` writes `index.html` here when set
    pub build_output: Option<PathBuf>,
    pub build_dir_existed_at_build: Option<bool>,
    pub policy_seen: Option<PolicySeen>,
}

impl RecordingRunner {
    pub fn new(build_output: Option<PathBuf>) -> Self {
        Self {
            calls: Vec::new(),
            fail_steps: HashMap::new(),
            missing_program_steps: Vec::new(),
            interrupt_at: None,
            build_output,
            build_dir_existed_at_build: None,
            policy_seen: None,
        }
    }

    pub fn failing(mut self, step: &'static str, exit_code: Option<i32>) -> Self {
        self.fail_steps.insert(step, exit_code);
        self
    }

    pub fn steps(&self) -> Vec<&str> {
        self.calls.iter().map(|c| c.step.as_str()).collect()
    }

    #[allow(dead_code)]
    pub fn call(&self, step: &str) -> Option<&Call> {
        self.calls.iter().find(|c| c.step == step)
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, command: &dyn CommandArgs) -> s3deploy::error::Result<CommandOutput> {
        let call = Call {
            program: command.program().to_string(),
            args: command.to_cli_args(),
            env: command.get_env_vars(),
            step: command.step_name().to_string(),
        };

        if call.step == SET_POLICY {
            if let Some(uri) = call.args.last() {
                let path = PathBuf::from(uri.trim_start_matches("file://"));
                self.policy_seen = Some(PolicySeen {
                    existed: path.exists(),
                    contents: fs::read_to_string(&path).unwrap_or_default(),
                    path,
                });
            }
        }

        if call.step == BUILD {
            if let Some(dir) = &self.build_output {
                self.build_dir_existed_at_build = Some(dir.exists());
                fs::create_dir_all(dir).unwrap();
                fs::write(dir.join("index.html"), "<html></html>").unwrap();
            }
        }

        self.calls.push(call);

        if self.missing_program_steps.contains(&command.step_name()) {
            return Err(DeployError::spawn(
                command.step_name(),
                command.program(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            ));
        }

        if self.interrupt_at == Some(command.step_name()) {
            return Err(DeployError::Interrupted { signal: 15 });
        }

        match self.fail_steps.get(command.step_name()) {
            Some(code) => Ok(CommandOutput::failed(command, *code)),
            None => Ok(CommandOutput::succeeded(command)),
        }
    }
}

/// Temporary project directory with a `build/web` output path.
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.path().join("build").join("web")
    }

    pub fn config(&self, region: &str, bucket: &str) -> DeployConfig {
        DeployConfig::new(region, bucket, self.build_dir())
    }

    pub fn runner(&self) -> RecordingRunner {
        RecordingRunner::new(Some(self.build_dir()))
    }

    #[allow(dead_code)]
    pub fn write_stale_build(&self, name: &str) -> PathBuf {
        let dir = self.build_dir();
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, "stale").unwrap();
        path
    }
}

pub struct Outcome {
    pub result: Result<DeployReport, DeployError>,
    pub failed_at: Option<DeployStage>,
    pub output: String,
}

pub fn deploy<R: CommandRunner>(config: &DeployConfig, runner: &mut R) -> Outcome {
    let mut out = Vec::new();
    let mut deployer = Deployer::new(config, runner, &mut out);
    let result = deployer.run();
    let failed_at = deployer.context().failed_at();
    drop(deployer);

    Outcome {
        result,
        failed_at,
        output: String::from_utf8(out).unwrap(),
    }
}
