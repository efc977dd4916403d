//! Subprocess execution with a hard timeout.
//!
//! Output is read line by line while the child runs so long installs show
//! progress in the debug log. A child that outlives its timeout is killed.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RunnerError, RunnerResult};

/// Result of a finished command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    pub command: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Turn a non-zero exit into an error.
    pub fn check(self) -> RunnerResult<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(RunnerError::CommandFailed {
            command: self.command.clone(),
            code: self.exit_code,
            output: self.combined_output(),
        })
    }
}

/// Format a command line for logging.
pub fn format_command(program: &str, args: &[&str]) -> String {
    let mut cmd = program.to_string();
    for arg in args {
        if arg.contains(' ') || arg.contains('=') {
            cmd.push_str(&format!(" '{}'", arg));
        } else {
            cmd.push_str(&format!(" {}", arg));
        }
    }
    cmd
}

/// Run `program` in `dir`, killing it if it runs longer than `timeout`.
///
/// A non-zero exit is not an error here; see [`CommandOutput::check`].
pub async fn run_command(
    dir: &Path,
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> RunnerResult<CommandOutput> {
    let command = format_command(program, args);
    debug!("Executing in {}: {}", dir.display(), command);

    let mut child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RunnerError::SpawnFailed {
            program: program.to_string(),
            message: e.to_string(),
        })?;

    let stdout = child.stdout.take().map(|s| collect_lines(s, "stdout"));
    let stderr = child.stderr.take().map(|s| collect_lines(s, "stderr"));

    let started_at = Utc::now();
    let start = Instant::now();

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            warn!("{} exceeded {:?}, killing it", command, timeout);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", command, e);
            }
            return Err(RunnerError::Timeout(timeout));
        }
    };

    let output = CommandOutput {
        command,
        exit_code: status.code(),
        stdout: join_output(stdout).await,
        stderr: join_output(stderr).await,
        started_at,
        finished_at: Utc::now(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "{} finished with {:?} in {}ms",
        output.command, output.exit_code, output.duration_ms
    );
    Ok(output)
}

fn collect_lines<R>(reader: R, stream: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut output = String::new();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("[{}] {}", stream, line);
            output.push_str(&line);
            output.push('\n');
        }
        output
    })
}

async fn join_output(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_command_quotes() {
        assert_eq!(format_command("npm", &["run", "build"]), "npm run build");
        assert_eq!(
            format_command("sh", &["-c", "exit 3", "A=B"]),
            "sh -c 'exit 3' 'A=B'"
        );
    }

    #[test]
    fn test_combined_output() {
        let mut output = CommandOutput {
            command: "x".into(),
            exit_code: Some(1),
            stdout: "out".into(),
            stderr: String::new(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            duration_ms: 0,
        };
        assert_eq!(output.combined_output(), "out");
        output.stderr = "err".into();
        assert_eq!(output.combined_output(), "out\nerr");
        assert!(matches!(
            output.check(),
            Err(RunnerError::CommandFailed { code: Some(1), .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let dir = std::env::temp_dir();
        let err = run_command(&dir, "kiln-no-such-program", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::SpawnFailed { .. }));
    }
}
