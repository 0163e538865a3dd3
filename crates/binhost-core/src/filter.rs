//! Private-package filtering.
//!
//! A filter set is built once per run by scanning the private overlay
//! directory for package definitions, then threaded through the resolver as
//! a plain value. Matching is substring containment over a candidate
//! entry's path.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::PublishError;

/// Private overlays to scan, relative to the build root.
pub const PRIVATE_OVERLAY_DIR: &str = "src/private-overlays";

static EBUILD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)-\d.*\.ebuild$").expect("static pattern"));

/// A set of package-name fragments; candidates containing any fragment are
/// excluded from publication.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    fragments: BTreeSet<String>,
}

impl FilterSet {
    /// A filter that matches nothing (filtering disabled).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a filter from explicit fragments.
    pub fn from_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    /// Scan the private overlay directory under `build_root` for package
    /// definition files and collect their package names.
    ///
    /// # Errors
    ///
    /// An empty result is a configuration error, not an empty-filter no-op:
    /// finding no private packages means the scan path is wrong.
    pub fn scan_private_overlays(build_root: &Path) -> Result<Self, PublishError> {
        let root = build_root.join(PRIVATE_OVERLAY_DIR);
        let mut fragments = BTreeSet::new();

        for entry in WalkDir::new(&root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if let Some(caps) = EBUILD_NAME.captures(&name) {
                fragments.insert(caps[1].to_string());
            }
        }

        if fragments.is_empty() {
            return Err(PublishError::Config(format!(
                "no private package filters found under {}",
                root.display()
            )));
        }

        Ok(Self { fragments })
    }

    /// Whether no fragments are loaded.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Whether `path` names a private package. Matches are logged.
    pub fn matches(&self, path: &str) -> bool {
        for fragment in &self.fragments {
            if path.contains(fragment.as_str()) {
                debug!(path, fragment, "filtering private package");
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_ebuild(root: &Path, overlay: &str, category: &str, file: &str) {
        let dir = root
            .join(PRIVATE_OVERLAY_DIR)
            .join(overlay)
            .join(category);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file), "").unwrap();
    }

    #[test]
    fn scan_collects_package_names() {
        let root = tempfile::tempdir().unwrap();
        write_ebuild(root.path(), "overlay-secret", "chromeos-base", "secretd-1.0.ebuild");
        write_ebuild(root.path(), "overlay-secret", "chromeos-base", "hush-0.0.1-r2.ebuild");
        // Not an ebuild, must be ignored.
        write_ebuild(root.path(), "overlay-secret", "chromeos-base", "README");

        let filter = FilterSet::scan_private_overlays(root.path()).unwrap();
        assert!(filter.matches("chromeos-base/secretd-1.0"));
        assert!(filter.matches("chromeos-base/hush-0.0.1-r2"));
        assert!(!filter.matches("chromeos-base/public-1.0"));
    }

    #[test]
    fn empty_scan_is_a_config_error() {
        let root = tempfile::tempdir().unwrap();
        let err = FilterSet::scan_private_overlays(root.path()).unwrap_err();
        assert!(matches!(err, PublishError::Config(_)));
    }

    #[test]
    fn empty_filter_matches_nothing() {
        let filter = FilterSet::empty();
        assert!(!filter.matches("chromeos-base/anything-1.0"));
    }
}
