//! External command execution for build and pack steps.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;

/// Why a command could not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout_secs} seconds")]
    TimedOut { program: String, timeout_secs: u64 },
}

/// Result of one command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (-1 if terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }

    /// Last non-empty stderr line, for failure reasons.
    pub fn stderr_tail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim()
    }
}

/// Runs one argv in a working directory.
pub struct CommandRunner;

impl CommandRunner {
    /// Execute `argv` in `cwd`, killing the child if `timeout_secs` elapses
    /// (0 = no timeout) or the returned future is dropped.
    pub async fn run(
        argv: &[String],
        cwd: &Path,
        timeout_secs: u64,
    ) -> Result<CommandResult, RunnerError> {
        let start = Instant::now();

        let (program, args) = argv.split_first().ok_or(RunnerError::EmptyCommand)?;

        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = if timeout_secs > 0 {
            tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
                .await
                .map_err(|_| RunnerError::TimedOut {
                    program: program.clone(),
                    timeout_secs,
                })?
        } else {
            child.wait_with_output().await
        }
        .map_err(|source| RunnerError::Spawn {
            program: program.clone(),
            source,
        })?;

        Ok(CommandResult {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}
