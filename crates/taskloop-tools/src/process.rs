use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{info, warn};

/// Captured result of a shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed (timeout or signal).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A child process running in its own process group, so the whole tree
/// (including orphaned grandchildren holding our pipes) can be killed.
struct ManagedChild {
    child: tokio::process::Child,
    pgid: i32,
}

impl ManagedChild {
    /// SIGTERM the group, wait `grace_period`, then SIGKILL.
    async fn kill_group(&mut self, grace_period: Duration) {
        if let Err(e) = kill(Pid::from_raw(-self.pgid), Signal::SIGTERM) {
            // ESRCH: already gone
            if e != nix::errno::Errno::ESRCH {
                warn!("SIGTERM to process group {} failed: {e}", self.pgid);
            }
            return;
        }

        if tokio::time::timeout(grace_period, self.child.wait())
            .await
            .is_err()
        {
            if let Err(e) = kill(Pid::from_raw(-self.pgid), Signal::SIGKILL) {
                if e != nix::errno::Errno::ESRCH {
                    warn!("SIGKILL to process group {} failed: {e}", self.pgid);
                }
            }
            let _ = self.child.wait().await;
        }
    }
}

/// Run `sh -c <command>` in `dir` with a deadline. On timeout the process
/// group is killed and the output is returned with `timed_out` set.
pub async fn run_shell(
    command: &str,
    dir: &Path,
    timeout: Duration,
    kill_grace: Duration,
) -> std::io::Result<CommandOutput> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = cmd.spawn()?;
    let pgid = child
        .id()
        .ok_or_else(|| std::io::Error::other("child exited before its pid was read"))?
        as i32;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr not captured"))?;
    let mut managed = ManagedChild { child, pgid };

    let mut stdout_bytes = Vec::new();
    let mut stderr_bytes = Vec::new();
    let result = tokio::time::timeout(timeout, async {
        tokio::try_join!(
            stdout.read_to_end(&mut stdout_bytes),
            stderr.read_to_end(&mut stderr_bytes),
            managed.child.wait()
        )
    })
    .await;

    match result {
        Ok(Ok((_, _, status))) => Ok(CommandOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            timed_out: false,
        }),
        Ok(Err(e)) => Err(e),
        Err(_elapsed) => {
            info!("command timed out after {timeout:?}, killing process group: {command}");
            managed.kill_group(kill_grace).await;
            Ok(CommandOutput {
                exit_code: None,
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: format!("Timeout after {}s", timeout.as_secs()),
                timed_out: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_shell(
            "echo out && echo err >&2",
            dir.path(),
            Duration::from_secs(10),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("out"));
        assert!(out.stderr.contains("err"));
    }

    #[tokio::test]
    async fn reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_shell("exit 3", dir.path(), Duration::from_secs(10), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
    }

    #[tokio::test]
    async fn timeout_kills_the_group() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_shell("sleep 10", dir.path(), Duration::from_secs(1), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.exit_code, None);
        assert!(out.stderr.contains("Timeout"));
    }

    #[tokio::test]
    async fn runs_in_given_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let out = run_shell("cat marker.txt", dir.path(), Duration::from_secs(10), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "here");
    }
}
