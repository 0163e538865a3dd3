//! External command execution with captured output.
//!
//! Transport and VCS operations all go through here. The working directory
//! is always an explicit parameter, never a process-wide chdir, so
//! concurrent invocations in the same process stay safe.

use std::path::Path;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Retry bound for transient transport failures.
pub const RETRIES: u32 = 3;

/// Failure to spawn a command or a nonzero exit.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The program could not be started at all.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to spawn.
        program: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The program ran but exited with a nonzero status.
    #[error("{program} exited with status {code}: {stderr}")]
    Failed {
        /// Program that failed.
        program: String,
        /// Exit code, or -1 when killed by a signal.
        code: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },
}

/// Captured output of a successful command.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Run `program` with `args`, capturing output.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or exits nonzero.
pub async fn run_command(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<RunOutput, CommandError> {
    debug!(program, ?args, "running command");
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = command.output().await.map_err(|source| CommandError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        return Err(CommandError::Failed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(RunOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr,
    })
}

/// Run a command, retrying up to `attempts` times on failure.
///
/// Each failure is logged; returns whether any attempt succeeded.
pub async fn retry_run(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    attempts: u32,
) -> bool {
    for attempt in 1..=attempts {
        match run_command(program, args, cwd).await {
            Ok(_) => return true,
            Err(err) => {
                warn!(program, attempt, attempts, error = %err, "command failed");
            }
        }
    }
    warn!(program, attempts, "giving up after retries");
    false
}
