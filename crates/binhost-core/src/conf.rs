//! Config pointer synchronization.
//!
//! A publish is only discoverable once a `KEY="VALUE"` line in a config
//! file points at it. [`update_local_file`] is the pure text rewrite;
//! [`rev_git_file`] wraps it in branch-isolated commit-and-push with retry,
//! and [`update_binhost_conf`] is the append-only variant that commits a
//! per-target history file without pushing.
//!
//! All git invocations take the repository directory explicitly; nothing
//! here changes the process working directory.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::PublishError;
use crate::run::{run_command, CommandError, RunOutput};

/// Config key updated by default.
pub const DEFAULT_KEY: &str = "PORTAGE_BINHOST";

/// Push attempts before a pointer update is declared failed.
pub const DEFAULT_PUSH_RETRIES: u32 = 5;

const WORK_BRANCH: &str = "binhost-update";
const PUSH_BACKOFF: Duration = Duration::from_secs(5);
const BINHOST_CONF_SEED: &str = "FULL_BINHOST=\"$PORTAGE_BINHOST\"\n";

/// Rewrite `key` to `value` in a `KEY="VALUE"` config file.
///
/// Lines that do not parse as exactly one `=`-delimited pair pass through
/// verbatim; the key's line is replaced with the quoted value; other
/// recognized lines are rewritten as `key=value`; a missing key is
/// appended. Exactly one line for the key exists afterward, and the
/// operation is idempotent.
///
/// # Errors
///
/// Returns an error when the file cannot be read or written.
pub fn update_local_file(path: &Path, key: &str, value: &str) -> std::io::Result<()> {
    let text = fs::read_to_string(path)?;
    let mut lines = Vec::new();
    let mut found = false;

    for line in text.lines() {
        let parts: Vec<&str> = line.split('=').collect();
        if parts.len() != 2 {
            lines.push(line.to_string());
            continue;
        }
        let (file_key, file_value) = (parts[0], parts[1]);
        if file_key == key {
            found = true;
            info!(key, old = file_value, new = value, "updating config value");
            lines.push(format!("{key}=\"{value}\""));
        } else {
            lines.push(format!("{file_key}={file_value}"));
        }
    }

    if !found {
        lines.push(format!("{key}=\"{value}\""));
    }

    fs::write(path, lines.join("\n") + "\n")
}

async fn git(cwd: &Path, args: &[&str]) -> Result<RunOutput, CommandError> {
    let args: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
    run_command("git", &args, Some(cwd)).await
}

/// Update `key` in a version-controlled file and push the change.
///
/// Synchronizes the repository, moves onto an isolated work branch so
/// unrelated local changes cannot collide, commits the rewrite, and pushes
/// with up to `retries` attempts (linear backoff between failures).
/// Whatever happens, the work branch is abandoned and the previous branch
/// restored before returning.
///
/// # Errors
///
/// Returns [`PublishError::PushFailed`] when every push attempt fails, or
/// the underlying git/file error otherwise.
pub async fn rev_git_file(
    path: &Path,
    key: &str,
    value: &str,
    retries: u32,
) -> Result<(), PublishError> {
    let cwd = path
        .parent()
        .ok_or_else(|| PublishError::Config(format!("no parent directory for {}", path.display())))?;
    let description = format!("Update {key}=\"{value}\" in {}", path.display());
    info!("{description}");

    git(cwd, &["pull", "--rebase"]).await?;
    // Branch off the current upstream so push.default=tracking knows where
    // the work branch lands.
    let upstream = git(
        cwd,
        &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
    )
    .await?;
    git(
        cwd,
        &["checkout", "-b", WORK_BRANCH, "--track", upstream.stdout.trim()],
    )
    .await?;

    let result = commit_and_push(cwd, path, key, value, &description, retries).await;

    // Cleanup must run regardless of the push outcome.
    if let Err(err) = git(cwd, &["checkout", "-"]).await {
        warn!(error = %err, "failed to restore previous branch");
    }
    if let Err(err) = git(cwd, &["branch", "-D", WORK_BRANCH]).await {
        warn!(error = %err, "failed to delete work branch");
    }

    result
}

async fn commit_and_push(
    cwd: &Path,
    path: &Path,
    key: &str,
    value: &str,
    description: &str,
    retries: u32,
) -> Result<(), PublishError> {
    git(cwd, &["config", "push.default", "tracking"]).await?;
    update_local_file(path, key, value)?;
    git(cwd, &["commit", "-am", description]).await?;

    for attempt in 1..=retries {
        let pushed = async {
            git(cwd, &["pull", "--rebase"]).await?;
            git(cwd, &["push"]).await
        }
        .await;
        match pushed {
            Ok(_) => return Ok(()),
            Err(err) => {
                warn!(attempt, retries, error = %err, "push failed");
                if attempt < retries {
                    sleep(PUSH_BACKOFF * attempt).await;
                }
            }
        }
    }

    Err(PublishError::PushFailed {
        file: path.display().to_string(),
        attempts: retries,
    })
}

/// Append-only variant: update `key` in a per-target history file and
/// commit it in its own repository without pushing.
///
/// A missing file is seeded with the default binhost line first.
///
/// # Errors
///
/// Returns the underlying git or filesystem error.
pub async fn update_binhost_conf(path: &Path, key: &str, value: &str) -> Result<(), PublishError> {
    let cwd = path
        .parent()
        .ok_or_else(|| PublishError::Config(format!("no parent directory for {}", path.display())))?;
    fs::create_dir_all(cwd)?;
    if !path.is_file() {
        fs::write(path, BINHOST_CONF_SEED)?;
    }

    update_local_file(path, key, value)?;

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PublishError::Config(format!("invalid file name: {}", path.display())))?;
    let description = format!("Update {key}={value} in {filename}");
    git(cwd, &["add", filename]).await?;
    git(cwd, &["commit", "-m", &description]).await?;
    Ok(())
}
