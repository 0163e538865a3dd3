//! The publish error taxonomy.
//!
//! One tagged type instead of an exception hierarchy: callers match on the
//! discriminant to tell configuration mistakes from exhausted retries.

use binhost_schema::IndexError;
use thiserror::Error;

use crate::run::CommandError;

/// Everything that can go wrong during a publish.
#[derive(Error, Debug)]
pub enum PublishError {
    /// Invalid target name, empty filter scan, or other caller mistake.
    /// Raised before any remote side effect.
    #[error("configuration error: {0}")]
    Config(String),

    /// A transfer or command exhausted its local retries.
    #[error("retries exhausted: {context}")]
    TransientExhausted {
        /// What was being retried when the bound was hit.
        context: String,
    },

    /// One or more items still failed after per-item retries. Aggregated
    /// across all parallel attempts, not reported on first failure.
    #[error("upload failed for {} transfer(s): {}", failed.len(), failed.join(", "))]
    UploadFailed {
        /// Human-readable `local -> remote` pair (or command) per failure.
        failed: Vec<String>,
    },

    /// A config push failed every attempt, backoff included.
    #[error("failed to push {file} after {attempts} attempts")]
    PushFailed {
        /// File whose pointer update could not be pushed.
        file: String,
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// A non-retried external command failed (git plumbing, mostly).
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The local package index could not be read or parsed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Filesystem failure outside the index format.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
