//! Command execution interface and the privilege-dropping implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::identity::{Identity, IdentityError};
use super::subprocess;

/// One external program invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// OS account to run as. `None` or empty keeps the caller's identity.
    pub user: Option<String>,
    /// Working directory. `None` or empty inherits the caller's.
    pub work_dir: Option<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            user: None,
            work_dir: None,
        }
    }

    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn in_dir(mut self, dir: impl Into<String>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref().filter(|u| !u.is_empty())
    }

    pub fn work_dir(&self) -> Option<&str> {
        self.work_dir.as_deref().filter(|d| !d.is_empty())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Interleaved stdout and stderr.
    pub output: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The requested account could not be resolved. Nothing was spawned.
    #[error("resolve identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("start command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wait for command `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
        output: String,
    },

    /// `exit_code` is `None` when the process was killed by a signal.
    #[error("command `{command}` exited with {}: {output}", exit_label(*.exit_code))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("command `{command}` timed out after {elapsed_ms}ms: {output}")]
    Timeout {
        command: String,
        elapsed_ms: u64,
        output: String,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "signal".to_string(),
    }
}

impl ExecError {
    /// Output captured before the failure, empty if the process never ran.
    pub fn output(&self) -> &str {
        match self {
            Self::Identity(_) | Self::Spawn { .. } => "",
            Self::Wait { output, .. } | Self::Failed { output, .. } | Self::Timeout { output, .. } => {
                output
            }
        }
    }
}

/// Runs external programs on behalf of the deployment pipeline.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion.
    ///
    /// A non-zero exit is an error; the combined output is returned either way.
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError>;
}

/// Production [`CommandRunner`].
///
/// When a user is given the account is resolved before spawning and the
/// child switches to its uid, primary gid and supplementary groups between
/// fork and exec. The child inherits the full environment of this process.
#[derive(Debug, Clone, Default)]
pub struct PrivilegedExecutor {
    timeout: Option<Duration>,
}

impl PrivilegedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill commands that run longer than `timeout`. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CommandRunner for PrivilegedExecutor {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ExecError> {
        let identity = spec.user().map(Identity::resolve).transpose()?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = spec.work_dir() {
            cmd.current_dir(dir);
        }

        if let Some(identity) = identity {
            tracing::debug!(
                command = %spec,
                user = %identity.user,
                uid = identity.uid.as_raw(),
                gid = identity.gid.as_raw(),
                "Running command with dropped privileges",
            );
            // SAFETY: the closure only issues setgroups/setgid/setuid syscalls
            // on data prepared before fork; it does not allocate or lock.
            unsafe {
                cmd.pre_exec(move || identity.apply().map_err(std::io::Error::from));
            }
        } else {
            tracing::debug!(command = %spec, "Running command");
        }

        subprocess::run_command(&mut cmd, &spec.to_string(), self.timeout).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn current_user_name() -> String {
        nix::unistd::User::from_uid(nix::unistd::getuid())
            .expect("passwd lookup")
            .expect("current user has a passwd entry")
            .name
    }

    #[tokio::test]
    async fn echo_output_is_captured() {
        let out = PrivilegedExecutor::new()
            .run(CommandSpec::new("echo", ["Hello world"]))
            .await
            .expect("echo succeeds");
        assert_eq!(out.output, "Hello world\n");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn embedded_newlines_are_preserved() {
        let out = PrivilegedExecutor::new()
            .run(CommandSpec::new("echo", ["Hello world\n\n"]))
            .await
            .expect("echo succeeds");
        assert_eq!(out.output, "Hello world\n\n\n");
    }

    #[tokio::test]
    async fn stderr_lands_in_the_same_buffer() {
        let out = PrivilegedExecutor::new()
            .run(CommandSpec::new("sh", ["-c", "echo out; echo err 1>&2"]))
            .await
            .expect("sh succeeds");
        assert!(out.output.contains("out\n"));
        assert!(out.output.contains("err\n"));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_output() {
        let err = PrivilegedExecutor::new()
            .run(CommandSpec::new("sh", ["-c", "echo fatal: not a git repository 1>&2; exit 128"]))
            .await
            .expect_err("exit 128 is a failure");
        assert_matches!(&err, ExecError::Failed { exit_code: Some(128), .. });
        assert!(err.output().contains("fatal: not a git repository"));
        assert!(err.to_string().contains("exit code 128"));
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let err = PrivilegedExecutor::new()
            .run(CommandSpec::new("/nonexistent/hooktail-binary", Vec::<String>::new()))
            .await
            .expect_err("missing binary");
        assert_matches!(err, ExecError::Spawn { .. });
    }

    #[tokio::test]
    async fn unknown_user_fails_before_spawn() {
        let err = PrivilegedExecutor::new()
            .run(CommandSpec::new("echo", ["never"]).as_user("x-root-0851"))
            .await
            .expect_err("unknown user");
        assert_matches!(err, ExecError::Identity(IdentityError::UnknownUser(_)));
    }

    #[tokio::test]
    async fn runs_as_current_user() {
        let out = PrivilegedExecutor::new()
            .run(CommandSpec::new("id", ["-u"]).as_user(current_user_name()))
            .await
            .expect("id succeeds");
        assert_eq!(out.output.trim(), nix::unistd::getuid().as_raw().to_string());
    }

    #[tokio::test]
    async fn working_directory_is_applied() {
        let dir = tempfile::tempdir().expect("temp dir");
        let expected = dir.path().canonicalize().expect("canonicalize");
        let out = PrivilegedExecutor::new()
            .run(CommandSpec::new("pwd", ["-P"]).in_dir(dir.path().to_str().expect("utf-8")))
            .await
            .expect("pwd succeeds");
        assert_eq!(out.output.trim(), expected.to_str().expect("utf-8"));
    }

    #[tokio::test]
    async fn environment_is_inherited() {
        let out = PrivilegedExecutor::new()
            .run(CommandSpec::new("sh", ["-c", "echo \"$PATH\""]))
            .await
            .expect("sh succeeds");
        assert_eq!(out.output.trim(), std::env::var("PATH").unwrap_or_default());
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let err = PrivilegedExecutor::new()
            .with_timeout(Some(Duration::from_millis(200)))
            .run(CommandSpec::new("sleep", ["30"]))
            .await
            .expect_err("sleep outlives the timeout");
        assert_matches!(err, ExecError::Timeout { .. });
    }

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("git", ["reset", "--hard", "origin/main"]);
        assert_eq!(spec.to_string(), "git reset --hard origin/main");
    }

    #[test]
    fn empty_user_and_dir_read_as_absent() {
        let spec = CommandSpec::new("git", ["status"]).as_user("").in_dir("");
        assert_eq!(spec.user(), None);
        assert_eq!(spec.work_dir(), None);
    }
}
