//! The `Packages` manifest format.
//!
//! Layout on disk:
//!
//! ```text
//! ARCH: amd64
//! URI: http://example.com/prebuilt
//! TTL: 14400
//!
//! CPV: chromeos-base/foo-1.0
//! PATH: host/amd64/1.2.3/packages/chromeos-base/foo-1.0.tbz2
//! SHA1: ...
//!
//! CPV: chromeos-base/bar-2.1
//! ...
//! ```
//!
//! The first stanza is the header when it carries no `CPV` field; every
//! other stanza is a package record and must carry one. Fields this crate
//! does not understand round-trip verbatim and in their original order.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::{Cpv, PACKAGES_FILE};

/// Errors raised while reading or writing a `Packages` manifest.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Underlying file could not be read or written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A package stanza is missing its `CPV` field.
    #[error("package record {stanza} has no CPV field")]
    MissingCpv {
        /// Zero-based position of the offending stanza among package records.
        stanza: usize,
    },
}

/// One package record: an ordered list of `KEY: value` fields.
///
/// Invariant: a parsed entry always carries a `CPV` field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageEntry {
    fields: Vec<(String, String)>,
}

impl PackageEntry {
    /// Look up a field by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, replacing it in place if present, appending otherwise.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    /// The CPV identifier keying this record.
    ///
    /// # Panics
    ///
    /// Panics if the entry was constructed without a `CPV` field; parsed
    /// entries always carry one.
    pub fn cpv(&self) -> Cpv {
        Cpv::new(self.get("CPV").expect("package entry carries a CPV field"))
    }

    /// The storage path of the artifact, relative to the index's base URI.
    pub fn path(&self) -> Option<&str> {
        self.get("PATH")
    }

    /// File name of the artifact for this entry, relative to the packages
    /// directory.
    pub fn tbz2_name(&self) -> String {
        self.cpv().tbz2_name()
    }

    fn parse(stanza: &str) -> Self {
        let mut fields = Vec::new();
        for line in stanza.lines() {
            if let Some((key, value)) = line.split_once(':') {
                fields.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        Self { fields }
    }

    fn write_to(&self, out: &mut String) {
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
    }
}

/// An ordered collection of package records plus a header stanza.
///
/// Never mutated in place across publishes: a fresh index is built from the
/// local packages directory each time, and previously published indexes are
/// only read for comparison.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    header: Vec<(String, String)>,
    packages: Vec<PackageEntry>,
}

impl PackageIndex {
    /// Parse a manifest from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::MissingCpv`] when a non-header stanza lacks a
    /// `CPV` field.
    pub fn parse(text: &str) -> Result<Self, IndexError> {
        let mut header = Vec::new();
        let mut packages = Vec::new();

        for (position, stanza) in split_stanzas(text).enumerate() {
            let entry = PackageEntry::parse(stanza);
            if entry.get("CPV").is_none() {
                if position == 0 {
                    header = entry.fields;
                    continue;
                }
                return Err(IndexError::MissingCpv {
                    stanza: packages.len(),
                });
            }
            packages.push(entry);
        }

        Ok(Self { header, packages })
    }

    /// Load the manifest from `<dir>/Packages`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or fails to parse.
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let text = fs::read_to_string(dir.join(PACKAGES_FILE))?;
        Self::parse(&text)
    }

    /// Package records, in manifest order.
    pub fn entries(&self) -> &[PackageEntry] {
        &self.packages
    }

    /// Look up a header field by key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.header
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First entry with the given CPV, if any. CPVs are unique within one
    /// index, so the first match is the only one.
    pub fn find(&self, cpv: &str) -> Option<&PackageEntry> {
        self.packages.iter().find(|entry| entry.cpv() == cpv)
    }

    /// Record the destination of this publish: the base URI goes into the
    /// header, and every entry's `PATH` is rewritten to
    /// `<path_prefix>/<cpv>.tbz2`. Entries are assumed new until
    /// [`Self::resolve_duplicate_uploads`] proves otherwise.
    pub fn set_upload_location(&mut self, base_uri: &str, path_prefix: &str) {
        let base_uri = base_uri.trim_end_matches('/').to_string();
        let prefix = path_prefix.trim_matches('/');
        match self.header.iter_mut().find(|(k, _)| k == "URI") {
            Some((_, v)) => *v = base_uri,
            None => self.header.push(("URI".to_string(), base_uri)),
        }
        for entry in &mut self.packages {
            entry.set("PATH", format!("{prefix}/{}", entry.tbz2_name()));
        }
    }

    /// Drop entries matched by `predicate`, returning them so the caller
    /// can log each skip.
    pub fn remove_filtered<F>(&mut self, predicate: F) -> Vec<PackageEntry>
    where
        F: Fn(&PackageEntry) -> bool,
    {
        let mut removed = Vec::new();
        self.packages.retain(|entry| {
            if predicate(entry) {
                removed.push(entry.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Deduplicate against previously published indexes.
    ///
    /// For each local entry the previous indexes are scanned in the order
    /// given; on the first CPV match the entry adopts that index's `PATH`
    /// (and the owning index's `URI`, so the merged manifest keeps pointing
    /// at the old location). Entries found nowhere keep the freshly
    /// computed `PATH` and are returned as the upload set.
    pub fn resolve_duplicate_uploads(&mut self, previous: &[PackageIndex]) -> Vec<PackageEntry> {
        let mut uploads = Vec::new();
        for entry in &mut self.packages {
            let cpv = entry.cpv();
            let prior = previous
                .iter()
                .find_map(|index| index.find(&cpv).map(|found| (index, found)));
            match prior {
                Some((index, found)) => {
                    if let Some(path) = found.path() {
                        entry.set("PATH", path);
                    }
                    if let Some(uri) = found.get("URI").or_else(|| index.header("URI")) {
                        entry.set("URI", uri);
                    }
                }
                None => uploads.push(entry.clone()),
            }
        }
        uploads
    }

    /// Serialize into a named temporary file for transfer.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary file cannot be created or
    /// written.
    pub fn write_to_temp_file(&self) -> Result<NamedTempFile, IndexError> {
        let mut file = NamedTempFile::new()?;
        file.write_all(self.to_string().as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

impl std::fmt::Display for PackageIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        for (key, value) in &self.header {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        for entry in &self.packages {
            out.push('\n');
            entry.write_to(&mut out);
        }
        write!(f, "{out}")
    }
}

fn split_stanzas(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|stanza| !stanza.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
ARCH: amd64
TTL: 14400
URI: http://old.example.com/prebuilt

CPV: chromeos-base/foo-1.0
PATH: board/lumpy/0/packages/chromeos-base/foo-1.0.tbz2
SHA1: deadbeef
MTIME: 1

CPV: chromeos-base/bar-2.1
SIZE: 42
";

    #[test]
    fn parse_splits_header_and_packages() {
        let index = PackageIndex::parse(SAMPLE).unwrap();
        assert_eq!(index.header("ARCH"), Some("amd64"));
        assert_eq!(index.entries().len(), 2);
        assert_eq!(index.entries()[0].cpv(), "chromeos-base/foo-1.0");
        assert_eq!(index.entries()[1].get("SIZE"), Some("42"));
    }

    #[test]
    fn round_trip_preserves_unknown_fields_and_order() {
        let index = PackageIndex::parse(SAMPLE).unwrap();
        let written = index.to_string();
        let reparsed = PackageIndex::parse(&written).unwrap();
        assert_eq!(reparsed.to_string(), written);
        assert_eq!(reparsed.entries()[0].get("SHA1"), Some("deadbeef"));
        assert_eq!(reparsed.entries()[0].get("MTIME"), Some("1"));
        assert_eq!(reparsed.header("TTL"), Some("14400"));
    }

    #[test]
    fn package_stanza_without_cpv_is_rejected() {
        let text = "ARCH: amd64\n\nPATH: somewhere\n";
        let err = PackageIndex::parse(text).unwrap_err();
        assert!(matches!(err, IndexError::MissingCpv { stanza: 0 }));
    }

    #[test]
    fn set_upload_location_rewrites_every_path() {
        let mut index = PackageIndex::parse(SAMPLE).unwrap();
        index.set_upload_location("http://new.example.com/prebuilt/", "host/amd64/1.2.3/packages");
        assert_eq!(index.header("URI"), Some("http://new.example.com/prebuilt"));
        assert_eq!(
            index.entries()[0].path(),
            Some("host/amd64/1.2.3/packages/chromeos-base/foo-1.0.tbz2")
        );
        assert_eq!(
            index.entries()[1].path(),
            Some("host/amd64/1.2.3/packages/chromeos-base/bar-2.1.tbz2")
        );
    }

    #[test]
    fn duplicates_adopt_prior_location_and_leave_upload_set() {
        let previous = PackageIndex::parse(SAMPLE).unwrap();

        let local = "\
ARCH: amd64

CPV: chromeos-base/foo-1.0

CPV: chromeos-base/baz-3.0
";
        let mut index = PackageIndex::parse(local).unwrap();
        index.set_upload_location("http://new.example.com", "host/amd64/9/packages");
        let uploads = index.resolve_duplicate_uploads(std::slice::from_ref(&previous));

        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].cpv(), "chromeos-base/baz-3.0");

        let foo = index.find("chromeos-base/foo-1.0").unwrap();
        assert_eq!(
            foo.path(),
            Some("board/lumpy/0/packages/chromeos-base/foo-1.0.tbz2")
        );
        assert_eq!(foo.get("URI"), Some("http://old.example.com/prebuilt"));

        let baz = index.find("chromeos-base/baz-3.0").unwrap();
        assert_eq!(
            baz.path(),
            Some("host/amd64/9/packages/chromeos-base/baz-3.0.tbz2")
        );
    }

    #[test]
    fn no_previous_indexes_uploads_everything() {
        let mut index = PackageIndex::parse(SAMPLE).unwrap();
        index.set_upload_location("http://new.example.com", "host/amd64/9/packages");
        let uploads = index.resolve_duplicate_uploads(&[]);
        assert_eq!(uploads.len(), 2);
    }

    #[test]
    fn remove_filtered_returns_dropped_entries() {
        let mut index = PackageIndex::parse(SAMPLE).unwrap();
        let removed = index.remove_filtered(|entry| entry.cpv().contains("bar"));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].cpv(), "chromeos-base/bar-2.1");
        assert_eq!(index.entries().len(), 1);
    }

    #[test]
    fn load_reads_packages_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PACKAGES_FILE), SAMPLE).unwrap();
        let index = PackageIndex::load(dir.path()).unwrap();
        assert_eq!(index.entries().len(), 2);
    }

    #[test]
    fn write_to_temp_file_round_trips() {
        let index = PackageIndex::parse(SAMPLE).unwrap();
        let file = index.write_to_temp_file().unwrap();
        let text = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(text, index.to_string());
    }
}
