//! Artifact transfer.
//!
//! Two transports: the object-storage copy tool for `gs://` destinations,
//! run in parallel across a bounded worker pool with per-item retry, and a
//! short ssh/rsync sequence for `host:path` destinations. Neither transport
//! verifies content cryptographically; that is the consumer's problem by
//! design.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use binhost_schema::PackageEntry;
use futures::future;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::PublishError;
use crate::run::{retry_run, RETRIES};

/// Default number of parallel transfer workers.
pub const DEFAULT_POOL_SIZE: usize = 10;

const GSUTIL: &str = "gsutil";

/// One transfer: a local source file and its remote destination.
///
/// Tasks are derived from a resolved index via [`upload_tasks`], never
/// hand-constructed, and immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    /// Local file to transfer.
    pub local: PathBuf,
    /// Full remote destination path.
    pub remote: String,
}

impl UploadTask {
    /// `local -> remote` description for failure reports.
    pub fn describe(&self) -> String {
        format!("{} -> {}", self.local.display(), self.remote)
    }
}

/// Derive the transfer set for the given upload entries.
///
/// # Errors
///
/// Returns [`PublishError::Config`] when a built package named by the index
/// is missing on disk.
pub fn upload_tasks(
    package_dir: &Path,
    remote_location: &str,
    uploads: &[PackageEntry],
) -> Result<Vec<UploadTask>, PublishError> {
    let remote_base = remote_location.trim_end_matches('/');
    let mut tasks = Vec::with_capacity(uploads.len());
    for entry in uploads {
        let name = entry.tbz2_name();
        let local = package_dir.join(&name);
        if !local.is_file() {
            return Err(PublishError::Config(format!(
                "built package missing: {}",
                local.display()
            )));
        }
        tasks.push(UploadTask {
            local,
            remote: format!("{remote_base}/{name}"),
        });
    }
    Ok(tasks)
}

/// Parallel object-storage uploader.
#[derive(Debug, Clone)]
pub struct Uploader {
    /// Maximum concurrent transfers.
    pub concurrency: usize,
    /// Per-item retry bound.
    pub retries: u32,
    /// Transport program; swapped for a stub in tests.
    pub program: String,
}

impl Default for Uploader {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_POOL_SIZE,
            retries: RETRIES,
            program: GSUTIL.to_string(),
        }
    }
}

impl Uploader {
    /// Uploader with default pool size, retries, and transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploader that drives a different transport program.
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
            ..Self::default()
        }
    }

    /// Transfer every task, retrying each individually, and return the set
    /// that ultimately failed (empty = full success).
    ///
    /// Every task is attempted independently; a failure in one never
    /// cancels the others. When `deadline` elapses the wait ends with an
    /// error instead of re-polling indefinitely; still-running workers are
    /// detached at that point.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::TransientExhausted`] when the deadline
    /// elapses before all transfers settle. A non-empty failure set is
    /// *not* an error here; the caller decides that it is fatal.
    pub async fn upload(
        &self,
        tasks: Vec<UploadTask>,
        deadline: Option<Duration>,
    ) -> Result<Vec<UploadTask>, PublishError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            let program = self.program.clone();
            let retries = self.retries;

            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return Some(task);
                };
                let args = vec![
                    "cp".to_string(),
                    "-a".to_string(),
                    "public-read".to_string(),
                    task.local.display().to_string(),
                    task.remote.clone(),
                ];
                if retry_run(&program, &args, None, retries).await {
                    None
                } else {
                    warn!(local = %task.local.display(), remote = %task.remote, "upload failed");
                    Some(task)
                }
            }));
        }

        let wait = async {
            let mut failed = Vec::new();
            for joined in future::join_all(handles).await {
                match joined {
                    Ok(None) => {}
                    Ok(Some(task)) => failed.push(task),
                    Err(err) => return Err(PublishError::Io(std::io::Error::other(err))),
                }
            }
            Ok(failed)
        };

        match deadline {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                PublishError::TransientExhausted {
                    context: format!("upload deadline of {limit:?} exceeded"),
                }
            })?,
            None => wait.await,
        }
    }
}

/// Build the remote-shell command sequence: ensure the directory exists,
/// copy the index, then copy the package files when there are any.
pub fn remote_shell_commands(
    server: &str,
    remote_path: &str,
    remote_location: &str,
    index_file: &Path,
    pkgs: &[String],
) -> Vec<(String, Vec<String>)> {
    let remote_base = remote_location.trim_end_matches('/');
    let remote_packages = format!("{remote_base}/{}", binhost_schema::PACKAGES_FILE);

    let mut commands = vec![
        (
            "ssh".to_string(),
            vec![
                server.to_string(),
                "mkdir".to_string(),
                "-p".to_string(),
                remote_path.to_string(),
            ],
        ),
        (
            "rsync".to_string(),
            vec![
                "-av".to_string(),
                "--chmod=a+r".to_string(),
                index_file.display().to_string(),
                remote_packages,
            ],
        ),
    ];
    if !pkgs.is_empty() {
        let mut args = vec!["-Rav".to_string()];
        args.extend(pkgs.iter().cloned());
        args.push(format!("{remote_base}/"));
        commands.push(("rsync".to_string(), args));
    }
    commands
}

/// Transfer via the remote-shell path.
///
/// Commands run in sequence from `package_dir`, each with per-command
/// retry; the first command to exhaust its retries aborts the rest.
///
/// # Errors
///
/// Returns [`PublishError::UploadFailed`] naming the command that gave up.
pub async fn upload_via_remote_shell(
    server: &str,
    remote_path: &str,
    remote_location: &str,
    index_file: &Path,
    pkgs: &[String],
    package_dir: &Path,
) -> Result<(), PublishError> {
    for (program, args) in remote_shell_commands(server, remote_path, remote_location, index_file, pkgs)
    {
        info!(program, "running remote-shell transfer step");
        if !retry_run(&program, &args, Some(package_dir), RETRIES).await {
            return Err(PublishError::UploadFailed {
                failed: vec![format!("{program} {}", args.join(" "))],
            });
        }
    }
    Ok(())
}
