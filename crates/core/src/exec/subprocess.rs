//! Spawn, capture and wait.
//!
//! [`run_command`] is shared by every [`CommandRunner`](super::CommandRunner)
//! implementation that shells out. The caller configures program, arguments,
//! working directory and credentials; this module wires up the pipes,
//! collects stdout and stderr into one buffer, and enforces the optional
//! timeout.

use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::executor::{CommandOutput, ExecError};

/// Maximum combined output kept per command (10 MiB). Anything beyond is
/// read and discarded so the child never blocks on a full pipe.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How long to keep reading after the child exits. Background processes
/// started by a hook script can hold the pipes open indefinitely.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(5);

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Spawn `cmd`, capture its combined output and wait for it to exit.
///
/// `command` is the human-readable command line used in errors. With a
/// `timeout`, the child is killed once it elapses.
pub async fn run_command(
    cmd: &mut Command,
    command: &str,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ExecError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        command: command.to_string(),
        source,
    })?;

    let buffer: SharedBuffer = Arc::default();
    let pumps = [
        tokio::spawn(pump(child.stdout.take(), Arc::clone(&buffer))),
        tokio::spawn(pump(child.stderr.take(), Arc::clone(&buffer))),
    ];

    let waited = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait()).await.ok(),
        None => Some(child.wait().await),
    };

    let Some(waited) = waited else {
        let _ = child.kill().await;
        drain(pumps).await;
        return Err(ExecError::Timeout {
            command: command.to_string(),
            elapsed_ms: elapsed_ms(start),
            output: take_output(&buffer),
        });
    };

    drain(pumps).await;
    let output = take_output(&buffer);

    let status = waited.map_err(|source| ExecError::Wait {
        command: command.to_string(),
        source,
        output: output.clone(),
    })?;

    if !status.success() {
        return Err(ExecError::Failed {
            command: command.to_string(),
            exit_code: status.code(),
            output,
        });
    }

    Ok(CommandOutput {
        output,
        exit_code: status.code().unwrap_or(0),
        duration_ms: elapsed_ms(start),
    })
}

/// Copy a child stream into the shared buffer until EOF.
async fn pump<R: AsyncRead + Unpin>(stream: Option<R>, buffer: SharedBuffer) {
    let Some(mut stream) = stream else {
        return;
    };
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buf = buffer.lock().unwrap_or_else(PoisonError::into_inner);
                let room = MAX_OUTPUT_BYTES.saturating_sub(buf.len());
                buf.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
}

/// Wait for both pumps, giving up after [`OUTPUT_DRAIN_GRACE`].
async fn drain(pumps: [JoinHandle<()>; 2]) {
    for pump in pumps {
        let abort = pump.abort_handle();
        if tokio::time::timeout(OUTPUT_DRAIN_GRACE, pump).await.is_err() {
            abort.abort();
        }
    }
}

fn take_output(buffer: &SharedBuffer) -> String {
    let buf = buffer.lock().unwrap_or_else(PoisonError::into_inner);
    String::from_utf8_lossy(&buf).into_owned()
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
