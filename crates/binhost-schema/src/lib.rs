//! Shared types and wire format for binhost package indexes.
//!
//! A binhost serves prebuilt binary packages to downstream builders. Its
//! manifest is the `Packages` file: a header stanza followed by one stanza
//! per package, each a sequence of `KEY: value` lines, stanzas separated by
//! blank lines. This crate owns that format and the [`Cpv`] identifier that
//! keys every package record.

pub mod cpv;
pub mod index;

pub use cpv::Cpv;
pub use index::{IndexError, PackageEntry, PackageIndex};

/// File name of the package manifest inside a packages directory.
pub const PACKAGES_FILE: &str = "Packages";
