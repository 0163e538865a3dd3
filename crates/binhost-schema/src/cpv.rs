//! Category/package/version identifiers.

use std::borrow::Borrow;

/// A category/package/version identifier, e.g. `chromeos-base/foo-1.0`.
///
/// Uniquely names one built package artifact within an index. Stored
/// verbatim; the artifact file name is derived via [`Cpv::tbz2_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cpv(String);

impl Cpv {
    /// Create a new CPV from the given string (stored as-is).
    pub fn new(cpv: &str) -> Self {
        Self(cpv.to_string())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the binary package artifact for this CPV.
    pub fn tbz2_name(&self) -> String {
        format!("{}.tbz2", self.0)
    }
}

impl std::fmt::Display for Cpv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for Cpv {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Cpv {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Cpv {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Cpv {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Cpv {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<&str> for Cpv {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Cpv {
    fn from(s: String) -> Self {
        Self(s)
    }
}
