//! Type-Safe Command Execution
//!
//! Every external program the pipeline starts goes through a
//! `CommandRunner`. `SystemRunner` is the production implementation:
//!
//! - argv comes from `CommandArgs`, never from a shell string
//! - stdout/stderr are inherited so the user sees the tool's own output;
//!   stdin is closed since nothing is interactive
//! - the child leads its own process group, registered for signal
//!   forwarding while it runs
//! - nothing new starts once a termination signal has arrived
//!
//! A non-zero exit is NOT an `Err` here: the runner reports what happened in
//! `CommandOutput` and the caller decides whether the failure is fatal
//! (`ensure_success`) or tolerated. `Err` is reserved for a program that
//! could not be started or waited on, and for a run cut short by a signal.

use crate::command_traits::CommandArgs;
use crate::error::{DeployError, Result};
use crate::process_guard::{self, ChildRegistry, CommandProcessGroup, terminate_group};
use nix::sys::signal::Signal;
use std::process::{Command, Stdio};

/// Executes typed external commands.
pub trait CommandRunner {
    /// Run `command` to completion.
    ///
    /// # Returns
    ///
    /// - `Ok(output)` - the program ran; check `output.success`
    /// - `Err(DeployError::Spawn)` - the program could not be started
    /// - `Err(DeployError::Interrupted)` - a termination signal arrived
    fn run(&mut self, command: &dyn CommandArgs) -> Result<CommandOutput>;

    /// True if commands are only printed, never executed
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    dry_run: bool,
}

impl SystemRunner {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &dyn CommandArgs) -> Result<CommandOutput> {
        let program = command.program();
        let cli_args = command.to_cli_args();
        let env_vars = command.get_env_vars();

        tracing::debug!("run: {} args={:?} env={:?}", program, cli_args, env_vars);

        if self.dry_run {
            println!("   [DRY RUN] {}", command.display_command());
            return Ok(CommandOutput::dry_run(command));
        }

        interrupted()?;

        let mut cmd = Command::new(program);
        cmd.args(&cli_args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .in_new_process_group();

        for (key, value) in &env_vars {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| DeployError::spawn(command.step_name(), program, e))?;
        let pid = child.id();

        let registered = match ChildRegistry::global().lock() {
            Ok(mut registry) => registry.register(pid),
            Err(_) => true,
        };
        if !registered {
            // Shutdown began between the signal check and the spawn
            terminate_group(pid, Signal::SIGTERM);
        }

        let status = child.wait();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let status = status.map_err(|e| DeployError::wait(command.step_name(), program, e))?;
        interrupted()?;

        let exit_code = status.code();
        if status.success() {
            tracing::info!("{} succeeded", command.step_name());
        } else {
            tracing::info!(
                "{} exited with code {}",
                command.step_name(),
                exit_code.unwrap_or(-1)
            );
        }

        Ok(CommandOutput {
            command: command.display_command(),
            step: command.step_name().to_string(),
            exit_code,
            success: status.success(),
            dry_run: false,
        })
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Err once a termination signal has arrived.
fn interrupted() -> Result<()> {
    match process_guard::received_signal() {
        Some(signal) => Err(DeployError::Interrupted { signal }),
        None => Ok(()),
    }
}

/// Outcome of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Command line, for messages only.
    pub command: String,
    /// Step label from `CommandArgs::step_name`.
    pub step: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
    /// The command was printed, not executed.
    pub dry_run: bool,
}

impl CommandOutput {
    /// Successful exit for `command`.
    pub fn succeeded(command: &dyn CommandArgs) -> Self {
        Self {
            command: command.display_command(),
            step: command.step_name().to_string(),
            exit_code: Some(0),
            success: true,
            dry_run: false,
        }
    }

    /// Exit with `exit_code` (None = killed by a signal) for `command`.
    pub fn failed(command: &dyn CommandArgs, exit_code: Option<i32>) -> Self {
        Self {
            command: command.display_command(),
            step: command.step_name().to_string(),
            exit_code,
            success: false,
            dry_run: false,
        }
    }

    fn dry_run(command: &dyn CommandArgs) -> Self {
        Self {
            dry_run: true,
            ..Self::succeeded(command)
        }
    }

    /// Turn a failed exit into a fatal `DeployError::CommandFailed`.
    pub fn ensure_success(&self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(DeployError::command_failed(
                self.step.clone(),
                self.command.clone(),
                self.exit_code,
            ))
        }
    }
}
