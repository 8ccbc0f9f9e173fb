//! Bounded execution of external commands with captured output.

use std::{io, process::ExitStatus, process::Stdio, time::Duration};
use tokio::{io::AsyncReadExt, process::Command};
use tracing::warn;

/// Everything a finished child process produced.
#[derive(Debug)]
pub(crate) struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

#[derive(Debug)]
pub(crate) enum CaptureError {
    Spawn(io::Error),
    Io(io::Error),
    TimedOut,
}

/// Run `command` to completion, draining stdout and stderr concurrently as data arrives.
///
/// The child is killed if `limit` elapses first, or if the returned future is dropped.
pub(crate) async fn run_captured(mut command: Command, limit: Duration) -> Result<CapturedOutput, CaptureError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(CaptureError::Spawn)?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| CaptureError::Io(io::Error::other("child stdout was not piped")))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| CaptureError::Io(io::Error::other("child stderr was not piped")))?;

    let collect = async {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let (read_out, read_err) = tokio::join!(stdout.read_to_end(&mut out), stderr.read_to_end(&mut err));
        read_out?;
        read_err?;
        let status = child.wait().await?;
        Ok::<_, io::Error>(CapturedOutput {
            status,
            stdout: out,
            stderr: err,
        })
    };

    match tokio::time::timeout(limit, collect).await {
        Ok(result) => result.map_err(CaptureError::Io),
        Err(_) => {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to kill timed out child process");
            }
            let _ = child.wait().await;
            Err(CaptureError::TimedOut)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn test_captures_both_streams() {
        let output = run_captured(sh("echo out; echo err >&2"), Duration::from_secs(10)).await.unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr_lossy(), "err");
    }

    #[tokio::test]
    async fn test_reports_exit_code() {
        let output = run_captured(sh("exit 3"), Duration::from_secs(10)).await.unwrap();
        assert_eq!(output.status.code(), Some(3));
    }

    #[tokio::test]
    async fn test_large_output_on_both_streams_does_not_deadlock() {
        let script = "i=0; while [ $i -lt 2000 ]; do echo 0123456789abcdef0123456789abcdef; echo fedcba9876543210fedcba9876543210 >&2; i=$((i+1)); done";
        let output = run_captured(sh(script), Duration::from_secs(30)).await.unwrap();
        assert_eq!(output.stdout.len(), 2000 * 33);
        assert_eq!(output.stderr.len(), 2000 * 33);
    }

    #[tokio::test]
    async fn test_times_out() {
        let result = run_captured(sh("sleep 30"), Duration::from_millis(200)).await;
        assert!(matches!(result, Err(CaptureError::TimedOut)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let command = Command::new("/nonexistent/medscan-test-binary");
        let result = run_captured(command, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(CaptureError::Spawn(_))));
    }
}
