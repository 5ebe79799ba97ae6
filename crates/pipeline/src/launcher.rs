//! Hands deployments off to their own tasks.
//!
//! The webhook handler must answer before any git command runs, so every
//! accepted delivery becomes an independent tokio task. The tasks are
//! tracked so shutdown can wait for in-flight runs. [`LaunchMode::Inline`]
//! awaits the run instead, which keeps integration tests deterministic.

use std::sync::Arc;
use std::time::Duration;

use hooktail_core::target::DeploymentTarget;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::machine::DeploymentPipeline;
use crate::stage::DeploymentReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// Spawn the run and return immediately.
    #[default]
    Background,
    /// Run to completion before returning.
    Inline,
}

/// Handle returned for every accepted deployment.
#[derive(Debug)]
pub struct Launched {
    pub run_id: Uuid,
    /// Present only in [`LaunchMode::Inline`].
    pub report: Option<DeploymentReport>,
}

pub struct DeploymentLauncher {
    pipeline: Arc<DeploymentPipeline>,
    mode: LaunchMode,
    tracker: TaskTracker,
}

impl DeploymentLauncher {
    pub fn new(pipeline: Arc<DeploymentPipeline>, mode: LaunchMode) -> Self {
        Self {
            pipeline,
            mode,
            tracker: TaskTracker::new(),
        }
    }

    /// Start a deployment of `target`.
    ///
    /// The target is moved into the run; nothing from the triggering
    /// request is retained.
    pub async fn launch(&self, target: DeploymentTarget) -> Launched {
        let run_id = Uuid::now_v7();
        match self.mode {
            LaunchMode::Background => {
                let pipeline = Arc::clone(&self.pipeline);
                self.tracker.spawn(async move {
                    pipeline.run(run_id, target).await;
                });
                Launched {
                    run_id,
                    report: None,
                }
            }
            LaunchMode::Inline => Launched {
                run_id,
                report: Some(self.pipeline.run(run_id, target).await),
            },
        }
    }

    /// Number of background runs still executing.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting runs and wait up to `grace` for in-flight ones.
    ///
    /// Returns `false` if runs were still executing when the grace period
    /// ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for in-flight deployments");
        }
        tokio::time::timeout(grace, self.tracker.wait()).await.is_ok()
    }
}
