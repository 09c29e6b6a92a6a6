//! Subprocess helpers.
//!
//! Centralizes platform flags for spawned console binaries (ffmpeg, ffprobe)
//! and bounded execution with both output streams captured.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Apply platform-specific flags to a std process command.
pub fn configure_std_command(cmd: &mut std::process::Command) {
    #[cfg(target_os = "windows")]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Apply platform-specific flags to a tokio process command.
pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Output of a finished child process
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Result of a bounded run
#[derive(Debug)]
pub enum RunOutcome {
    Completed(CapturedOutput),
    /// The limit elapsed and the child was killed
    TimedOut,
}

/// Spawns `cmd`, drains stdout/stderr concurrently and waits at most `limit`.
///
/// Both pipes are drained in their own tasks so a chatty child can never
/// block on a full pipe buffer.
pub async fn run_bounded(
    cmd: &mut tokio::process::Command,
    limit: Option<Duration>,
) -> std::io::Result<RunOutcome> {
    configure_tokio_command(cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let stdout_task = child.stdout.take().map(drain);
    let stderr_task = child.stderr.take().map(drain);

    let status = match limit {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.kill().await;
                return Ok(RunOutcome::TimedOut);
            }
        },
        None => child.wait().await?,
    };

    Ok(RunOutcome::Completed(CapturedOutput {
        status,
        stdout: collect(stdout_task).await,
        stderr: collect(stderr_task).await,
    }))
}

fn drain<R>(mut reader: R) -> JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).to_string()
    })
}

async fn collect(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_command_can_be_configured() {
        #[cfg(target_os = "windows")]
        let mut cmd = std::process::Command::new("cmd");
        #[cfg(not(target_os = "windows"))]
        let mut cmd = std::process::Command::new("echo");
        configure_std_command(&mut cmd);
        configure_std_command(&mut cmd);
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn run_bounded_captures_stdout() {
        let mut cmd = tokio::process::Command::new("echo");
        cmd.arg("captured");

        let outcome = run_bounded(&mut cmd, Some(Duration::from_secs(10)))
            .await
            .unwrap();
        match outcome {
            RunOutcome::Completed(output) => {
                assert!(output.success());
                assert_eq!(output.stdout.trim(), "captured");
            }
            RunOutcome::TimedOut => panic!("echo should not time out"),
        }
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn run_bounded_captures_stderr_and_exit_code() {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.args(["-c", "echo broken >&2; exit 3"]);

        let outcome = run_bounded(&mut cmd, None).await.unwrap();
        let RunOutcome::Completed(output) = outcome else {
            panic!("sh should complete");
        };
        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stderr.trim(), "broken");
    }

    #[cfg(not(target_os = "windows"))]
    #[tokio::test]
    async fn run_bounded_kills_on_timeout() {
        let mut cmd = tokio::process::Command::new("sleep");
        cmd.arg("5");

        let outcome = run_bounded(&mut cmd, Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::TimedOut));
    }

    #[tokio::test]
    async fn run_bounded_reports_missing_binary() {
        let mut cmd = tokio::process::Command::new("quickcap-definitely-missing-binary");
        assert!(run_bounded(&mut cmd, None).await.is_err());
    }
}
