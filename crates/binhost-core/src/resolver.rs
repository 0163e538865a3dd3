//! Index resolution: what does this publish actually need to transfer?
//!
//! Loads the freshly built local index, drops filtered entries, rewrites
//! storage URIs to the new destination, then deduplicates against indexes
//! from previous publishes. An unfetchable previous index is logged and
//! treated as "no match" for that index: the affected entries are uploaded
//! again rather than failing the whole publish.

use std::path::Path;

use binhost_schema::{PackageEntry, PackageIndex, PACKAGES_FILE};
use tracing::{info, warn};

use crate::error::PublishError;
use crate::filter::FilterSet;

/// The merged index to write out, plus the subset that must be transferred.
#[derive(Debug)]
pub struct ResolvedIndex {
    /// Canonical index referencing old and new locations correctly.
    pub index: PackageIndex,
    /// Entries not found in any previous index; a true subset of the local
    /// build output.
    pub uploads: Vec<PackageEntry>,
}

/// Load and resolve the local index for one publish.
///
/// # Errors
///
/// Returns an error when the local `Packages` file cannot be read or
/// parsed.
pub fn resolve_index(
    package_dir: &Path,
    binhost_base_url: &str,
    url_suffix: &str,
    filter: &FilterSet,
    previous: &[PackageIndex],
) -> Result<ResolvedIndex, PublishError> {
    let mut index = PackageIndex::load(package_dir)?;

    let removed = index.remove_filtered(|entry| {
        let candidate = entry.path().map_or_else(|| entry.cpv().to_string(), str::to_string);
        filter.matches(&candidate)
    });
    for entry in &removed {
        info!(cpv = %entry.cpv(), "skipping filtered package");
    }

    index.set_upload_location(binhost_base_url, url_suffix);
    let uploads = index.resolve_duplicate_uploads(previous);

    info!(
        total = index.entries().len(),
        new = uploads.len(),
        filtered = removed.len(),
        "resolved package index"
    );

    Ok(ResolvedIndex { index, uploads })
}

/// Fetch previously published indexes, in the order given.
///
/// Each URL is fetched from `<url>/Packages`; a fetch or parse failure is
/// logged and the index skipped, so the publish re-uploads instead of
/// failing under partial outage.
pub async fn fetch_previous_indexes(urls: &[String]) -> Vec<PackageIndex> {
    let client = reqwest::Client::new();
    let mut indexes = Vec::new();
    for url in urls {
        if let Some(index) = fetch_remote_index(&client, url).await {
            indexes.push(index);
        }
    }
    indexes
}

/// Fetch one previously published index, or `None` when it is unreachable
/// or malformed.
pub async fn fetch_remote_index(client: &reqwest::Client, url: &str) -> Option<PackageIndex> {
    let packages_url = format!("{}/{PACKAGES_FILE}", url.trim_end_matches('/'));
    match fetch(client, &packages_url).await {
        Ok(index) => {
            info!(url = %packages_url, packages = index.entries().len(), "fetched previous index");
            Some(index)
        }
        Err(err) => {
            warn!(url = %packages_url, error = %err, "previous index unavailable; its entries will be re-uploaded");
            None
        }
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> anyhow::Result<PackageIndex> {
    let text = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(PackageIndex::parse(&text)?)
}
