//! Error handling module for s3deploy
//!
//! Every fatal condition in the deployment pipeline is a `DeployError`.
//! Tolerated failures (bucket creation) never become one.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the deployment pipeline
#[derive(Error, Debug)]
pub enum DeployError {
    /// IO errors (policy file, build directory removal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Policy document serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external program could not be started at all
    #[error("Failed to start `{program}` during {step}: {source}")]
    Spawn {
        step: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program started but could not be waited on
    #[error("Lost track of `{program}` during {step}: {source}")]
    Wait {
        step: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program ran and exited unsuccessfully
    #[error("{step} failed: `{command}` exited with {}", describe_exit(exit_code))]
    CommandFailed {
        step: String,
        command: String,
        exit_code: Option<i32>,
    },

    /// The build tool succeeded but left nothing to upload
    #[error("Build finished but output directory {} does not exist", .0.display())]
    BuildOutputMissing(PathBuf),

    /// A path handed to the `aws` CLI is not valid UTF-8
    #[error("Path {} is not valid UTF-8", .0.display())]
    NonUtf8Path(PathBuf),

    /// SIGINT/SIGTERM/SIGHUP arrived; nothing further is started
    #[error("Interrupted by signal {signal}")]
    Interrupted { signal: i32 },

    /// Deploy state machine transition errors
    #[error("Deploy transition error: {0}")]
    Transition(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {}", c),
        None => "a signal".to_string(),
    }
}

/// Result type alias for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Create a spawn error for `program` in `step`
    pub fn spawn(
        step: impl Into<String>,
        program: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Spawn {
            step: step.into(),
            program: program.into(),
            source,
        }
    }

    /// Create an error for a child whose exit status could not be collected
    pub fn wait(
        step: impl Into<String>,
        program: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Wait {
            step: step.into(),
            program: program.into(),
            source,
        }
    }

    /// Create a command failure error
    pub fn command_failed(
        step: impl Into<String>,
        command: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandFailed {
            step: step.into(),
            command: command.into(),
            exit_code,
        }
    }

    /// Exit code the external program returned, if this error carries one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}
