//! Test double for [`CommandRunner`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hooktail_core::exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use tokio::sync::Semaphore;

type FailWhen = Box<dyn Fn(&CommandSpec) -> bool + Send + Sync>;

/// Records every command instead of running it.
///
/// Commands succeed with empty output unless they match the failure
/// predicate, in which case they fail with exit code 1.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    fail_when: Option<FailWhen>,
    latency: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command for which `predicate` returns true.
    pub fn failing_when(predicate: impl Fn(&CommandSpec) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fail_when: Some(Box::new(predicate)),
            ..Self::default()
        }
    }

    /// Sleep for `latency` before recording each command.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Take one permit from `gate` before each command. Commands stall until
    /// the test adds permits.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Each recorded call rendered as a command line.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        if self.fail_when.as_ref().is_some_and(|fail| fail(&spec)) {
            return Err(ExecError::Failed {
                command: spec.to_string(),
                exit_code: Some(1),
                output: format!("{} failed", spec.program),
            });
        }
        Ok(CommandOutput {
            output: format!("ran {spec}\n"),
            exit_code: 0,
            duration_ms: 0,
        })
    }
}
