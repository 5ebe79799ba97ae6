//! Stage, state and outcome types for one deployment run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A step of the deployment pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Before,
    Sync,
    After,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Before => "before",
            Self::Sync => "sync",
            Self::After => "after",
        }
    }

    /// The state reached when this stage succeeds.
    pub fn completed_state(&self) -> DeploymentState {
        match self {
            Self::Validate => DeploymentState::Validated,
            Self::Before => DeploymentState::BeforeDone,
            Self::Sync => DeploymentState::Synced,
            Self::After => DeploymentState::AfterDone,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a deployment run.
///
/// `Created → Validated → BeforeDone → Synced → AfterDone`, or
/// `Aborted` from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeploymentState {
    Created,
    Validated,
    BeforeDone,
    Synced,
    AfterDone,
    Aborted { stage: Stage, reason: String },
}

impl DeploymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AfterDone | Self::Aborted { .. })
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: &DeploymentState) -> bool {
        use DeploymentState::*;
        match (self, next) {
            (_, Aborted { .. }) => !self.is_terminal(),
            (Created, Validated)
            | (Validated, BeforeDone)
            | (BeforeDone, Synced)
            | (Synced, AfterDone) => true,
            _ => false,
        }
    }
}

/// Result of a single stage, kept for logging only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub stage: Stage,
    pub succeeded: bool,
    /// Captured command output, or the validation error.
    pub detail: String,
}

/// Terminal summary of one deployment run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub run_id: Uuid,
    pub repository: String,
    pub state: DeploymentState,
    pub outcomes: Vec<ExecutionOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentReport {
    pub fn succeeded(&self) -> bool {
        self.state == DeploymentState::AfterDone
    }

    /// The stage that aborted the run, if any.
    pub fn aborted_stage(&self) -> Option<Stage> {
        match &self.state {
            DeploymentState::Aborted { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
