//! The per-object version manifest and everything computed from it.
//!
//! An inventory is read fresh from storage on every resolution request and
//! treated as immutable for the duration of that request. There is no
//! caching layer here.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::error::{OcflError, OcflResult};

/// One version's logical state: digest → logical paths carrying that
/// content.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VersionState {
    #[serde(default)]
    pub state: BTreeMap<String, Vec<String>>,
}

/// An object's `inventory.json`.
#[derive(Clone, Debug, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub id: Option<String>,
    pub head: String,
    pub versions: BTreeMap<String, VersionState>,
    pub manifest: BTreeMap<String, Vec<String>>,
}

/// One rung of an autoindex listing: a file name, or an immediate
/// subdirectory name ending in `/`.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize)]
pub struct Entry {
    pub href: String,
    pub text: String,
}

impl Entry {
    fn named(name: String) -> Self {
        Self { href: name.clone(), text: name }
    }

    fn parent() -> Self {
        Self { href: "../".into(), text: "[parent]".into() }
    }
}

/// Load and decode an object's inventory from its root directory.
pub fn load_inventory(object_root: &Path) -> OcflResult<Inventory> {
    let path = object_root.join("inventory.json");
    let data = std::fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            OcflError::InventoryNotFound(path.clone())
        } else {
            OcflError::Io(e)
        }
    })?;
    let inventory: Inventory =
        serde_json::from_slice(&data).map_err(|e| OcflError::Parse(e.to_string()))?;
    inventory.validate()?;
    Ok(inventory)
}

impl Inventory {
    /// Structural checks applied at load time: the head must name an
    /// existing version, and every digest in any version state must be
    /// resolvable through the manifest.
    pub fn validate(&self) -> OcflResult<()> {
        if !self.versions.contains_key(&self.head) {
            return Err(OcflError::Parse(format!(
                "head {} is not among the versions",
                self.head
            )));
        }
        for (vid, version) in &self.versions {
            for digest in version.state.keys() {
                if !self.manifest.contains_key(digest) {
                    return Err(OcflError::Parse(format!(
                        "version {vid} references digest {digest} missing from manifest"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve a version selector to a version id.
    ///
    /// An empty selector means the head version. Otherwise the leading `.`
    /// marker (as in `oid.v2` request paths) is stripped and the remainder
    /// used verbatim.
    pub fn locate_version(&self, selector: &str) -> OcflResult<&str> {
        if selector.is_empty() {
            return Ok(self.head.as_str());
        }
        let version = selector.strip_prefix('.').unwrap_or(selector);
        match self.versions.get_key_value(version) {
            Some((key, _)) => Ok(key.as_str()),
            None => Err(OcflError::UnknownVersion(version.to_string())),
        }
    }

    /// Find the physical path for a logical content path in one version.
    ///
    /// Scans the version's state for the digest whose logical-path set
    /// contains `logical`, then returns the first physical path the
    /// manifest lists for that digest.
    pub fn resolve_content(&self, version: &str, logical: &str) -> Option<&str> {
        let state = &self.versions.get(version)?.state;
        let digest = state
            .iter()
            .find(|(_, paths)| paths.iter().any(|p| p == logical))
            .map(|(digest, _)| digest)?;
        self.manifest.get(digest)?.first().map(String::as_str)
    }

    /// Directory-style listing of the logical paths under `prefix` in one
    /// version.
    ///
    /// Paths beginning with `prefix` are stripped of it and truncated to
    /// their next segment: a single remaining segment is a file entry, more
    /// than one collapses to `segment/`. Entries are deduplicated, filtered
    /// by `allow` (a pre-anchored pattern over entry names), and sorted.
    /// A synthetic parent entry is prepended when `prefix` is non-empty.
    ///
    /// Returns `None`, distinct from an empty listing, when no logical
    /// path matched the prefix at all.
    pub fn autoindex(
        &self,
        version: &str,
        prefix: &str,
        allow: Option<&Regex>,
    ) -> Option<Vec<Entry>> {
        let state = &self.versions.get(version)?.state;

        let mut names: BTreeSet<String> = BTreeSet::new();
        for paths in state.values() {
            for path in paths {
                let Some(rest) = path.strip_prefix(prefix) else {
                    continue;
                };
                debug!(prefix, path = %path, "autoindex match");
                match rest.split_once('/') {
                    None => names.insert(rest.to_string()),
                    Some((dir, _)) => names.insert(format!("{dir}/")),
                };
            }
        }

        if names.is_empty() {
            return None;
        }

        let mut entries: Vec<Entry> = names
            .into_iter()
            .filter(|name| allow_entry(allow, name))
            .map(Entry::named)
            .collect();
        if !prefix.is_empty() {
            entries.insert(0, Entry::parent());
        }
        Some(entries)
    }

    /// Every version that carries `logical`, with the digest it had there.
    /// Sorted by version id.
    pub fn history(&self, logical: &str) -> Vec<(String, String)> {
        self.versions
            .iter()
            .filter_map(|(vid, version)| {
                version
                    .state
                    .iter()
                    .find(|(_, paths)| paths.iter().any(|p| p == logical))
                    .map(|(digest, _)| (vid.clone(), digest.clone()))
            })
            .collect()
    }
}

/// Empty entry names always pass; otherwise the allow pattern (already
/// suffix-anchored by the caller) must match.
fn allow_entry(allow: Option<&Regex>, name: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    allow.map_or(true, |re| re.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_inventory() -> Inventory {
        serde_json::from_value(json!({
            "id": "ark:/1234/example",
            "head": "v2",
            "versions": {
                "v1": {
                    "state": {
                        "h1": ["data/a.txt"],
                        "h2": ["readme.md"]
                    }
                },
                "v2": {
                    "state": {
                        "h1": ["data/a.txt"],
                        "h3": ["data/b/c.txt"],
                        "h4": ["readme.md"]
                    }
                }
            },
            "manifest": {
                "h1": ["v1/content/data/a.txt"],
                "h2": ["v1/content/readme.md"],
                "h3": ["v2/content/data/b/c.txt"],
                "h4": ["v2/content/readme.md"]
            }
        }))
        .unwrap()
    }

    #[test]
    fn validate_accepts_consistent_inventory() {
        assert!(sample_inventory().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_head() {
        let mut inv = sample_inventory();
        inv.head = "v9".into();
        assert!(matches!(inv.validate(), Err(OcflError::Parse(_))));
    }

    #[test]
    fn validate_rejects_dangling_digest() {
        let mut inv = sample_inventory();
        inv.manifest.remove("h3");
        assert!(matches!(inv.validate(), Err(OcflError::Parse(_))));
    }

    #[test]
    fn locate_version_defaults_to_head() {
        let inv = sample_inventory();
        assert_eq!(inv.locate_version("").unwrap(), "v2");
    }

    #[test]
    fn locate_version_strips_marker() {
        let inv = sample_inventory();
        assert_eq!(inv.locate_version(".v1").unwrap(), "v1");
        assert_eq!(inv.locate_version("v1").unwrap(), "v1");
    }

    #[test]
    fn locate_version_unknown() {
        let inv = sample_inventory();
        assert!(matches!(
            inv.locate_version(".v7"),
            Err(OcflError::UnknownVersion(v)) if v == "v7"
        ));
    }

    #[test]
    fn resolve_content_returns_first_physical_path() {
        let inv = sample_inventory();
        assert_eq!(
            inv.resolve_content("v2", "data/b/c.txt"),
            Some("v2/content/data/b/c.txt")
        );
        // Content carried over from v1 resolves to its original location.
        assert_eq!(inv.resolve_content("v2", "data/a.txt"), Some("v1/content/data/a.txt"));
    }

    #[test]
    fn resolve_content_missing() {
        let inv = sample_inventory();
        assert_eq!(inv.resolve_content("v2", "nope.txt"), None);
        assert_eq!(inv.resolve_content("v9", "data/a.txt"), None);
    }

    #[test]
    fn autoindex_collapses_subdirectories() {
        let inv = sample_inventory();
        let entries = inv.autoindex("v2", "", None).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.href.as_str()).collect();
        assert_eq!(names, vec!["data/", "readme.md"]);
    }

    #[test]
    fn autoindex_within_subdirectory() {
        let inv = sample_inventory();
        let entries = inv.autoindex("v2", "data/", None).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.href.as_str()).collect();
        // Parent entry first, then the collapsed subtree and the file.
        assert_eq!(names, vec!["../", "a.txt", "b/"]);
        assert_eq!(entries[0].text, "[parent]");
    }

    #[test]
    fn autoindex_unmatched_prefix_is_none() {
        let inv = sample_inventory();
        assert!(inv.autoindex("v2", "missing/", None).is_none());
        assert!(inv.autoindex("v9", "", None).is_none());
    }

    #[test]
    fn autoindex_allow_filter_is_suffix_anchored() {
        let inv = sample_inventory();
        let allow = Regex::new(r"\.md$").unwrap();
        let entries = inv.autoindex("v2", "", Some(&allow)).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.href.as_str()).collect();
        assert_eq!(names, vec!["readme.md"]);
    }

    #[test]
    fn autoindex_filtered_to_nothing_is_still_a_listing() {
        let inv = sample_inventory();
        let allow = Regex::new(r"\.zip$").unwrap();
        // Paths matched the prefix, so this is an (empty) listing, not None.
        let entries = inv.autoindex("v2", "", Some(&allow)).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn history_lists_versions_carrying_a_path() {
        let inv = sample_inventory();
        let history = inv.history("readme.md");
        assert_eq!(
            history,
            vec![("v1".to_string(), "h2".to_string()), ("v2".to_string(), "h4".to_string())]
        );
        assert!(inv.history("nope.txt").is_empty());
    }

    #[test]
    fn load_inventory_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_inventory(dir.path()).unwrap_err();
        assert!(matches!(err, OcflError::InventoryNotFound(_)));
    }

    #[test]
    fn load_inventory_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("inventory.json"), b"not json").unwrap();
        let err = load_inventory(dir.path()).unwrap_err();
        assert!(matches!(err, OcflError::Parse(_)));
    }
}
