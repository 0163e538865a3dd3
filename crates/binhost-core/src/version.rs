//! Version stamps for namespacing a publish.

use chrono::Local;

/// Produce the version string used to namespace this publish.
///
/// Timestamp-based (`dd.mm.yy.HHMMSS`), so later publishes sort after
/// earlier ones at a glance; an optional caller-supplied label is prefixed
/// with a hyphen.
pub fn version_stamp(prefix: Option<&str>) -> String {
    let stamp = Local::now().format("%d.%m.%y.%H%M%S").to_string();
    match prefix {
        Some(label) => format!("{label}-{stamp}"),
        None => stamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn stamp_has_timestamp_shape() {
        let re = Regex::new(r"^\d{2}\.\d{2}\.\d{2}\.\d{6}$").unwrap();
        assert!(re.is_match(&version_stamp(None)));
    }

    #[test]
    fn prefix_is_prepended() {
        let stamped = version_stamp(Some("rc"));
        assert!(stamped.starts_with("rc-"));
    }
}
