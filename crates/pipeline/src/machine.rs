//! The validate → before → sync → after deployment state machine.
//!
//! Stages run strictly in order and the first failure aborts the run. No
//! stage is retried and a failed sync is not rolled back; the working copy
//! can be left between commits, and the abort log carries the git output.

use std::sync::Arc;

use chrono::Utc;
use hooktail_core::exec::{CommandRunner, CommandSpec};
use hooktail_core::target::DeploymentTarget;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::locks::TargetLocks;
use crate::stage::{DeploymentReport, DeploymentState, ExecutionOutcome, Stage};

/// Interpreter used for hook scripts.
pub const SHELL_PROGRAM: &str = "/bin/sh";

/// Source-control client used for synchronization.
pub const GIT_PROGRAM: &str = "git";

/// Runs deployments against a [`CommandRunner`].
///
/// Shared by every launched run; holds the per-working-copy locks.
pub struct DeploymentPipeline {
    runner: Arc<dyn CommandRunner>,
    locks: TargetLocks,
}

impl DeploymentPipeline {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            locks: TargetLocks::new(),
        }
    }

    /// Run one deployment of `target` to a terminal state.
    ///
    /// Waits first if another run holds the same working copy.
    pub async fn run(&self, run_id: Uuid, target: DeploymentTarget) -> DeploymentReport {
        let _guard = self.locks.acquire(&target.path).await;

        let mut run = DeploymentRun::new(run_id, &target, self.runner.as_ref());
        run.execute().await;
        run.into_report()
    }
}

/// One in-flight execution: its state, outcomes and the target it borrows.
struct DeploymentRun<'a> {
    run_id: Uuid,
    target: &'a DeploymentTarget,
    runner: &'a dyn CommandRunner,
    state: DeploymentState,
    outcomes: Vec<ExecutionOutcome>,
    started_at: chrono::DateTime<Utc>,
}

impl<'a> DeploymentRun<'a> {
    fn new(run_id: Uuid, target: &'a DeploymentTarget, runner: &'a dyn CommandRunner) -> Self {
        Self {
            run_id,
            target,
            runner,
            state: DeploymentState::Created,
            outcomes: Vec::new(),
            started_at: Utc::now(),
        }
    }

    async fn execute(&mut self) {
        tracing::info!(
            run_id = %self.run_id,
            repository = %self.target.repository,
            branch = %self.target.branch,
            path = %self.target.path,
            "Deployment started",
        );

        for stage in [Stage::Validate, Stage::Before, Stage::Sync, Stage::After] {
            let result = match stage {
                Stage::Validate => self.validate(),
                Stage::Before => self.hook(self.target.before_script()).await,
                Stage::Sync => self.sync().await,
                Stage::After => self.hook(self.target.after_script()).await,
            };

            match result {
                Ok(detail) => self.complete(stage, detail),
                Err(err) => {
                    self.abort(stage, err);
                    return;
                }
            }
        }

        tracing::info!(
            run_id = %self.run_id,
            repository = %self.target.repository,
            "Deployment finished",
        );
    }

    fn validate(&self) -> Result<String, PipelineError> {
        self.target.check_deployable()?;
        Ok(String::from("target is deployable"))
    }

    /// Run a hook script through the shell. No script is a no-op success.
    async fn hook(&self, script: Option<&str>) -> Result<String, PipelineError> {
        let Some(script) = script else {
            return Ok(String::from("no script configured"));
        };
        let spec = CommandSpec::new(SHELL_PROGRAM, [script]).as_user(&self.target.user);
        let out = self.runner.run(spec).await?;
        Ok(out.output)
    }

    /// Fetch, check out the branch and hard-reset it to the remote head.
    async fn sync(&self) -> Result<String, PipelineError> {
        let branch = &self.target.branch;
        let steps = [
            vec!["remote".to_string(), "update".to_string()],
            vec!["checkout".to_string(), branch.clone()],
            vec!["reset".to_string(), "--hard".to_string(), format!("origin/{branch}")],
        ];

        let mut detail = String::new();
        for args in steps {
            let spec = CommandSpec::new(GIT_PROGRAM, args)
                .as_user(&self.target.user)
                .in_dir(&self.target.path);
            let out = self.runner.run(spec).await?;
            detail.push_str(&out.output);
        }
        Ok(detail)
    }

    fn complete(&mut self, stage: Stage, detail: String) {
        self.transition(stage.completed_state());
        tracing::info!(
            run_id = %self.run_id,
            repository = %self.target.repository,
            stage = %stage,
            "Stage succeeded",
        );
        tracing::debug!(run_id = %self.run_id, stage = %stage, output = %detail, "Stage output");
        self.outcomes.push(ExecutionOutcome {
            stage,
            succeeded: true,
            detail,
        });
    }

    fn abort(&mut self, stage: Stage, err: PipelineError) {
        let reason = err.to_string();
        tracing::error!(
            run_id = %self.run_id,
            repository = %self.target.repository,
            stage = %stage,
            error = %reason,
            output = %err.detail(),
            "Deployment aborted",
        );
        self.outcomes.push(ExecutionOutcome {
            stage,
            succeeded: false,
            detail: err.detail(),
        });
        self.transition(DeploymentState::Aborted { stage, reason });
    }

    fn transition(&mut self, next: DeploymentState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    fn into_report(self) -> DeploymentReport {
        DeploymentReport {
            run_id: self.run_id,
            repository: self.target.repository.clone(),
            state: self.state,
            outcomes: self.outcomes,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
