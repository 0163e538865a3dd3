//! The publish orchestrator.
//!
//! Drives one publish invocation end to end: resolve the target, resolve
//! the index, transfer artifacts over the transport implied by the
//! destination scheme, then update the config pointers. Upload failure
//! aborts before any config mutation, so a config file never points at an
//! incomplete publish; a config failure after a successful upload is
//! surfaced to the caller but the published artifacts stay put.

use std::path::PathBuf;
use std::time::Duration;

use binhost_schema::{PackageIndex, PACKAGES_FILE};
use tracing::info;

use crate::conf::{rev_git_file, update_binhost_conf, DEFAULT_PUSH_RETRIES};
use crate::error::PublishError;
use crate::filter::FilterSet;
use crate::resolver::resolve_index;
use crate::target::PublishTarget;
use crate::upload::{upload_tasks, upload_via_remote_shell, UploadTask, Uploader};

/// Default base URL recorded in config pointers.
pub const DEFAULT_BINHOST_BASE_URL: &str =
    "http://commondatastorage.googleapis.com/chromeos-prebuilt";

const GS_SCHEME: &str = "gs://";

/// Everything one publish invocation needs.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Root of the build tree.
    pub build_root: PathBuf,
    /// Destination: `gs://bucket[/prefix]` or `host:path`.
    pub upload_location: String,
    /// Base URL written into config pointers.
    pub binhost_base_url: String,
    /// Version string namespacing this publish.
    pub version: String,
    /// Host or board being published.
    pub target: PublishTarget,
    /// Config key to update.
    pub key: String,
    /// Run the version-controlled config sync after a full upload.
    pub git_sync: bool,
    /// Push attempts for the version-controlled sync.
    pub git_sync_retries: u32,
    /// Run the append-only config sync after a full upload.
    pub sync_binhost_conf: bool,
    /// Private-package filter.
    pub filter: FilterSet,
    /// Object-storage transport.
    pub uploader: Uploader,
    /// Optional bound on the total upload wait.
    pub upload_deadline: Option<Duration>,
}

impl PublishRequest {
    /// A request with defaults for everything but the essentials.
    pub fn new(
        build_root: impl Into<PathBuf>,
        upload_location: impl Into<String>,
        version: impl Into<String>,
        target: PublishTarget,
    ) -> Self {
        Self {
            build_root: build_root.into(),
            upload_location: upload_location.into(),
            binhost_base_url: DEFAULT_BINHOST_BASE_URL.to_string(),
            version: version.into(),
            target,
            key: crate::conf::DEFAULT_KEY.to_string(),
            git_sync: false,
            git_sync_retries: DEFAULT_PUSH_RETRIES,
            sync_binhost_conf: false,
            filter: FilterSet::empty(),
            uploader: Uploader::new(),
            upload_deadline: None,
        }
    }
}

/// Publish one target: build and resolve the index, transfer what is new,
/// then record the published location.
///
/// # Errors
///
/// Configuration errors surface before any remote side effect; transfer
/// failures are aggregated and abort before config mutation; a config-sync
/// failure after a successful upload propagates without rolling the upload
/// back.
pub async fn publish(
    request: &PublishRequest,
    previous: &[PackageIndex],
) -> Result<(), PublishError> {
    let paths = request.target.resolve(&request.build_root, &request.version);
    // Resolve the make.conf up front when it will be needed, so a bad board
    // name fails before anything is transferred.
    let make_conf = if request.git_sync {
        Some(request.target.make_conf(&request.build_root)?)
    } else {
        None
    };

    let remote_location = format!(
        "{}/{}",
        request.upload_location.trim_end_matches('/'),
        paths.url_suffix
    );

    let resolved = resolve_index(
        &paths.package_dir,
        &request.binhost_base_url,
        &paths.url_suffix,
        &request.filter,
        previous,
    )?;
    let index_file = resolved.index.write_to_temp_file()?;

    if request.upload_location.starts_with(GS_SCHEME) {
        let mut tasks = upload_tasks(&paths.package_dir, &remote_location, &resolved.uploads)?;
        tasks.push(UploadTask {
            local: index_file.path().to_path_buf(),
            remote: format!("{remote_location}/{PACKAGES_FILE}"),
        });

        info!(target = ?request.target, transfers = tasks.len(), "uploading prebuilts");
        let failed = request
            .uploader
            .upload(tasks, request.upload_deadline)
            .await?;
        if !failed.is_empty() {
            return Err(PublishError::UploadFailed {
                failed: failed.iter().map(UploadTask::describe).collect(),
            });
        }
    } else {
        let (server, remote_path) = remote_location.split_once(':').ok_or_else(|| {
            PublishError::Config(format!(
                "upload location must be gs://... or host:path, got {}",
                request.upload_location
            ))
        })?;
        let pkgs: Vec<String> = resolved.uploads.iter().map(|e| e.tbz2_name()).collect();
        upload_via_remote_shell(
            server,
            remote_path,
            &remote_location,
            index_file.path(),
            &pkgs,
            &paths.package_dir,
        )
        .await?;
    }

    let url_value = format!(
        "{}/{}/",
        request.binhost_base_url.trim_end_matches('/'),
        paths.url_suffix
    );
    info!(url = %url_value, "publish complete");

    if let Some(make_conf) = make_conf {
        rev_git_file(&make_conf, &request.key, &url_value, request.git_sync_retries).await?;
    }
    if request.sync_binhost_conf {
        update_binhost_conf(&paths.binhost_conf, &request.key, &url_value).await?;
    }

    Ok(())
}
