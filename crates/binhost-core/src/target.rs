//! Publish targets and their filesystem/remote layout.
//!
//! A target is either the build host itself or a named hardware board. The
//! board naming convention decides which make.conf a publish updates: an
//! exact match on the host identifier selects the fixed host config, a name
//! containing an underscore is a board variant and maps to an
//! overlay-variant directory, a name of the `board-word` shape maps to a
//! plain overlay, and anything else is rejected outright. make.conf
//! resolution is deferred until a publish actually syncs it, so boards
//! outside the overlay convention can still upload.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::PublishError;

/// The host's package target identifier.
pub const HOST_TARGET: &str = "amd64";

/// Host packages directory, relative to the build root.
pub const HOST_PACKAGES_PATH: &str = "chroot/var/lib/portage/pkgs";

const BOARD_BUILD_DIR: &str = "chroot/build";
const OVERLAY_BASE_DIR: &str = "src/overlays";
const PREBUILT_MAKE_CONF_DIR: &str = "src/third_party/chromiumos-overlay/chromeos/config";
const BINHOST_CONF_DIR: &str = "src/third_party/chromiumos-overlay/chromeos/binhost";

static PLAIN_OVERLAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*?-\w+").expect("static pattern"));

/// The logical destination of one publish invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    /// The build host's own packages.
    Host,
    /// A named hardware board.
    Board(String),
}

/// Local and remote layout of a resolved target.
#[derive(Debug, Clone)]
pub struct TargetPaths {
    /// Local directory holding the built packages and their index.
    pub package_dir: PathBuf,
    /// Version-namespaced path under the upload destination.
    pub url_suffix: String,
    /// Per-target binhost conf updated by the append-only config sync.
    pub binhost_conf: PathBuf,
}

impl PublishTarget {
    /// Resolve this target's layout against a build root and publish
    /// version.
    pub fn resolve(&self, build_root: &Path, version: &str) -> TargetPaths {
        match self {
            Self::Host => TargetPaths {
                package_dir: build_root.join(HOST_PACKAGES_PATH),
                url_suffix: format!("host/{HOST_TARGET}/{version}/packages"),
                binhost_conf: build_root
                    .join(BINHOST_CONF_DIR)
                    .join("host")
                    .join(format!("{HOST_TARGET}.conf")),
            },
            Self::Board(board) => TargetPaths {
                package_dir: build_root
                    .join(BOARD_BUILD_DIR)
                    .join(board)
                    .join("packages"),
                url_suffix: format!("board/{board}/{version}/packages"),
                binhost_conf: build_root
                    .join(BINHOST_CONF_DIR)
                    .join("target")
                    .join(format!("{board}.conf")),
            },
        }
    }

    /// The make.conf this target's prebuilt pointer lives in.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Config`] when a board name fits no known
    /// shape; there is no fallback.
    pub fn make_conf(&self, build_root: &Path) -> Result<PathBuf, PublishError> {
        let relative = match self {
            Self::Host => host_make_conf(),
            Self::Board(board) => make_conf_for_board(board)?,
        };
        Ok(build_root.join(relative))
    }
}

fn host_make_conf() -> PathBuf {
    Path::new(PREBUILT_MAKE_CONF_DIR).join(format!("make.conf.{HOST_TARGET}-host"))
}

/// The make.conf a board's prebuilt pointer lives in, relative to the build
/// root.
///
/// # Errors
///
/// Returns [`PublishError::Config`] for names fitting no known shape.
pub fn make_conf_for_board(board: &str) -> Result<PathBuf, PublishError> {
    if board == HOST_TARGET {
        Ok(host_make_conf())
    } else if board.contains('_') {
        let overlay = format!("overlay-variant-{}", board.replace('_', "-"));
        Ok(Path::new(OVERLAY_BASE_DIR).join(overlay).join("make.conf"))
    } else if PLAIN_OVERLAY.is_match(board) {
        let overlay = format!("overlay-{board}");
        Ok(Path::new(OVERLAY_BASE_DIR).join(overlay).join("make.conf"))
    } else {
        Err(PublishError::Config(format!(
            "unknown board format: {board}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_board_maps_to_overlay_variant() {
        let path = make_conf_for_board("lumpy_variant").unwrap();
        assert_eq!(
            path,
            Path::new("src/overlays/overlay-variant-lumpy-variant/make.conf")
        );
    }

    #[test]
    fn plain_board_maps_to_overlay() {
        let path = make_conf_for_board("lumpy-board").unwrap();
        assert_eq!(path, Path::new("src/overlays/overlay-lumpy-board/make.conf"));
    }

    #[test]
    fn host_identifier_selects_fixed_conf() {
        let path = make_conf_for_board(HOST_TARGET).unwrap();
        assert_eq!(
            path,
            Path::new("src/third_party/chromiumos-overlay/chromeos/config/make.conf.amd64-host")
        );
    }

    #[test]
    fn unknown_shape_is_a_hard_error() {
        let err = make_conf_for_board("??invalid").unwrap_err();
        assert!(matches!(err, PublishError::Config(_)));
    }

    #[test]
    fn host_target_paths() {
        let paths = PublishTarget::Host.resolve(Path::new("/b/build"), "1.2.3");
        assert_eq!(
            paths.package_dir,
            Path::new("/b/build/chroot/var/lib/portage/pkgs")
        );
        assert_eq!(paths.url_suffix, "host/amd64/1.2.3/packages");
        assert!(paths.binhost_conf.ends_with("binhost/host/amd64.conf"));
    }

    #[test]
    fn board_target_paths() {
        let target = PublishTarget::Board("lumpy".to_string());
        let paths = target.resolve(Path::new("/b/build"), "1.2.3");
        assert_eq!(
            paths.package_dir,
            Path::new("/b/build/chroot/build/lumpy/packages")
        );
        assert_eq!(paths.url_suffix, "board/lumpy/1.2.3/packages");
        assert!(paths.binhost_conf.ends_with("binhost/target/lumpy.conf"));
    }

    #[test]
    fn host_make_conf_is_fixed() {
        let path = PublishTarget::Host.make_conf(Path::new("/b/build")).unwrap();
        assert!(path.ends_with("chromeos/config/make.conf.amd64-host"));
    }
}
