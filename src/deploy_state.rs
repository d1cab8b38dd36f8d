//! Deploy State Machine
//!
//! `DeployContext` is the single source of truth for how far a deployment
//! got. It only moves forward one stage at a time and records when each
//! stage was entered.
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! CreatingBucket          (failure tolerated, never enters Failed)
//!     ↓
//! UnblockingPublicAccess
//!     ↓
//! SettingPolicy
//!     ↓
//! EnablingWebsite
//!     ↓
//! Building
//!     ↓
//! Syncing
//!     ↓
//! Completed
//!
//! (Every other non-terminal stage can transition to Failed)
//! ```

use std::fmt;
use thiserror::Error;

/// Deployment stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeployStage {
    NotStarted = 0,
    CreatingBucket = 1,
    UnblockingPublicAccess = 2,
    SettingPolicy = 3,
    EnablingWebsite = 4,
    Building = 5,
    Syncing = 6,
    Completed = 7,
    Failed = 255,
}

impl DeployStage {
    /// Numeric order of this stage (255 for Failed)
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// A failed command in this stage is logged and the deployment moves on.
    #[inline]
    pub const fn is_failure_tolerated(self) -> bool {
        matches!(self, Self::CreatingBucket)
    }

    /// Next stage in the sequence, or None at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::CreatingBucket),
            Self::CreatingBucket => Some(Self::UnblockingPublicAccess),
            Self::UnblockingPublicAccess => Some(Self::SettingPolicy),
            Self::SettingPolicy => Some(Self::EnablingWebsite),
            Self::EnablingWebsite => Some(Self::Building),
            Self::Building => Some(Self::Syncing),
            Self::Syncing => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// Position shown in the progress header (1-based), None outside the six steps
    pub const fn step_number(self) -> Option<u8> {
        match self {
            Self::NotStarted | Self::Completed | Self::Failed => None,
            _ => Some(self as u8),
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::CreatingBucket => "Creating S3 Bucket",
            Self::UnblockingPublicAccess => "Unblocking Public Access",
            Self::SettingPolicy => "Setting Public Read Policy",
            Self::EnablingWebsite => "Enabling Static Website Hosting",
            Self::Building => "Building Flutter Web App",
            Self::Syncing => "Uploading to S3",
            Self::Completed => "Deployment complete",
            Self::Failed => "Deployment failed",
        }
    }

    /// All stages in order (excluding Failed)
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::NotStarted,
            Self::CreatingBucket,
            Self::UnblockingPublicAccess,
            Self::SettingPolicy,
            Self::EnablingWebsite,
            Self::Building,
            Self::Syncing,
            Self::Completed,
        ]
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployTransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage { from: DeployStage, to: DeployStage },

    #[error("Cannot go backwards from {from} to {to} (deployment is forward-only)")]
    BackwardTransition { from: DeployStage, to: DeployStage },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: DeployStage },

    /// Failures in this stage are absorbed, not propagated
    #[error("Stage {stage} tolerates failure and cannot enter the failed state")]
    FailureTolerated { stage: DeployStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: DeployStage },
}

/// Tracks the current stage of one deployment run.
///
/// # Example
///
/// ```
/// use s3deploy::deploy_state::{DeployContext, DeployStage};
///
/// let mut ctx = DeployContext::new();
/// ctx.transition_to(DeployStage::CreatingBucket).unwrap();
/// assert_eq!(ctx.current_stage(), DeployStage::CreatingBucket);
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(DeployStage::Building).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct DeployContext {
    current: DeployStage,
    failed_at: Option<DeployStage>,
    /// (stage, unix timestamp) for every stage entered
    stage_history: Vec<(DeployStage, u64)>,
}

impl Default for DeployContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployContext {
    pub fn new() -> Self {
        Self {
            current: DeployStage::NotStarted,
            failed_at: None,
            stage_history: Vec::with_capacity(DeployStage::all_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> DeployStage {
        self.current
    }

    /// Stage at which failure occurred, if any
    #[inline]
    pub fn failed_at(&self) -> Option<DeployStage> {
        self.failed_at
    }

    pub fn stage_history(&self) -> &[(DeployStage, u64)] {
        &self.stage_history
    }

    /// Transition to `target`, which must be the immediate next stage.
    pub fn transition_to(
        &mut self,
        target: DeployStage,
    ) -> Result<DeployStage, DeployTransitionError> {
        if self.current.is_terminal() {
            return Err(DeployTransitionError::FromTerminalState { from: self.current });
        }

        if target == self.current {
            return Err(DeployTransitionError::AlreadyAtStage { stage: target });
        }

        // Failed is only reachable through fail()
        if target == DeployStage::Failed {
            return Err(DeployTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        if target.order() < self.current.order() {
            return Err(DeployTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }

        if self.current.next() != Some(target) {
            return Err(DeployTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.record_stage_transition(target);
        self.current = target;

        Ok(target)
    }

    /// Mark the deployment as failed at the current stage.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already at Completed or Failed
    /// - `FailureTolerated` if the current stage absorbs failures
    pub fn fail(&mut self) -> Result<(), DeployTransitionError> {
        if self.current.is_terminal() {
            return Err(DeployTransitionError::FromTerminalState { from: self.current });
        }
        if self.current.is_failure_tolerated() {
            return Err(DeployTransitionError::FailureTolerated {
                stage: self.current,
            });
        }

        self.failed_at = Some(self.current);
        self.record_stage_transition(DeployStage::Failed);
        self.current = DeployStage::Failed;

        Ok(())
    }

    fn record_stage_transition(&mut self, stage: DeployStage) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        tracing::debug!("Deploy stage -> {}", stage);
        self.stage_history.push((stage, timestamp));
    }
}

impl From<DeployTransitionError> for crate::error::DeployError {
    fn from(err: DeployTransitionError) -> Self {
        crate::error::DeployError::Transition(err.to_string())
    }
}
