//! binhost - publish prebuilt binary packages and sync binhost config.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use binhost_core::conf::{DEFAULT_KEY, DEFAULT_PUSH_RETRIES};
use binhost_core::{
    fetch_previous_indexes, publish, version_stamp, FilterSet, PublishRequest, PublishTarget,
    DEFAULT_BINHOST_BASE_URL,
};

/// Publish locally built prebuilt packages to a binhost.
#[derive(Parser, Debug)]
#[command(name = "binhost", about)]
struct Cli {
    /// Base URL to use for binhost in make.conf updates
    #[arg(short = 'H', long, default_value = DEFAULT_BINHOST_BASE_URL)]
    binhost_base_url: String,

    /// Previous binhost URL (may be given multiple times)
    #[arg(long = "previous-binhost-url")]
    previous_binhost_url: Vec<String>,

    /// Board type that was built on this machine
    #[arg(short, long)]
    board: Option<String>,

    /// Path to the chroot
    #[arg(short = 'p', long)]
    build_path: PathBuf,

    /// Sync host prebuilts
    #[arg(short, long)]
    sync_host: bool,

    /// Enable git version sync (this commits to a repo)
    #[arg(short, long)]
    git_sync: bool,

    /// Push attempts before giving up on a git sync
    #[arg(long, default_value_t = DEFAULT_PUSH_RETRIES)]
    git_sync_retries: u32,

    /// Upload location (gs://bucket/path or host:path)
    #[arg(short, long)]
    upload: String,

    /// Add an identifier to the front of the version
    #[arg(short = 'V', long)]
    prepend_version: Option<String>,

    /// Turn on filtering of private ebuild packages
    #[arg(short, long)]
    filters: bool,

    /// Key to update in make.conf / binhost.conf
    #[arg(short, long, default_value = DEFAULT_KEY)]
    key: String,

    /// Update binhost.conf
    #[arg(long)]
    sync_binhost_conf: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if !cli.sync_host && cli.board.is_none() {
        bail!("nothing to publish: pass --sync-host and/or --board");
    }

    let filter = if cli.filters {
        FilterSet::scan_private_overlays(&cli.build_path)?
    } else {
        FilterSet::empty()
    };

    let version = version_stamp(cli.prepend_version.as_deref());
    info!(%version, "publishing prebuilts");

    let previous = fetch_previous_indexes(&cli.previous_binhost_url).await;

    let mut targets = Vec::new();
    if cli.sync_host {
        targets.push(PublishTarget::Host);
    }
    if let Some(board) = &cli.board {
        targets.push(PublishTarget::Board(board.clone()));
    }

    for target in targets {
        let mut request =
            PublishRequest::new(&cli.build_path, &cli.upload, &version, target);
        request.binhost_base_url = cli.binhost_base_url.clone();
        request.key = cli.key.clone();
        request.git_sync = cli.git_sync;
        request.git_sync_retries = cli.git_sync_retries;
        request.sync_binhost_conf = cli.sync_binhost_conf;
        request.filter = filter.clone();
        publish(&request, &previous).await?;
    }

    Ok(())
}
