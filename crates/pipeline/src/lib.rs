//! Deployment execution pipeline.
//!
//! [`DeploymentPipeline`] drives one target through
//! validate → before → sync → after on top of a
//! [`CommandRunner`](hooktail_core::exec::CommandRunner);
//! [`DeploymentLauncher`] turns accepted webhooks into independent runs.

pub mod error;
pub mod launcher;
pub mod locks;
pub mod machine;
pub mod stage;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::PipelineError;
pub use launcher::{DeploymentLauncher, LaunchMode, Launched};
pub use machine::DeploymentPipeline;
pub use stage::{DeploymentReport, DeploymentState, ExecutionOutcome, Stage};
