//! Core publish pipeline for binhost prebuilts.
//!
//! Computes which locally built packages are genuinely new (deduplicating
//! against previously published indexes), transfers them with bounded
//! concurrency and per-item retry, and records the resulting remote
//! location into a versioned configuration file so downstream builders
//! discover it.
//!
//! # Pipeline
//!
//! 1. [`target`] resolves a [`PublishTarget`] into the local packages
//!    directory, the remote path template, and the config files to update.
//! 2. [`resolver`] loads the local index, strips filtered entries, rewrites
//!    storage URIs, and deduplicates against prior publishes.
//! 3. [`upload`] transfers the new artifacts, either in parallel over the
//!    object-storage transport or as a short remote-shell sequence.
//! 4. [`conf`] rewrites the `KEY="VALUE"` pointer and, for the
//!    version-controlled variant, commits and pushes it with retry.
//!
//! [`publish::publish`] drives the whole sequence for one target.

pub mod conf;
pub mod error;
pub mod filter;
pub mod publish;
pub mod resolver;
pub mod run;
pub mod target;
pub mod upload;
pub mod version;

pub use error::PublishError;
pub use filter::FilterSet;
pub use publish::{publish, PublishRequest, DEFAULT_BINHOST_BASE_URL};
pub use resolver::fetch_previous_indexes;
pub use target::PublishTarget;
pub use upload::Uploader;
pub use version::version_stamp;
