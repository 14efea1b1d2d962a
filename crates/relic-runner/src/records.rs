//! Loading indexable records out of the repository.
//!
//! Each object contributes one record: its linked-data catalog file
//! (located through the head version of the inventory), its
//! repository-relative path, and a hashed form of that path usable as a
//! stable identifier. Objects without a readable catalog are skipped with
//! a warning; they never abort the pass.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use relic_index::FileResolver;
use relic_ocfl::{find_objects, load_inventory, Inventory};

use crate::config::CatalogNames;
use crate::error::RunnerResult;

/// One object ready for indexing.
#[derive(Debug)]
pub struct CrateRecord {
    /// Repository-relative object path.
    pub path: String,
    /// Hex digest of `path`; the `hashpaths` identifier.
    pub hash_path: String,
    /// The parsed catalog document.
    pub json: Value,
    pub object_root: PathBuf,
    pub inventory: Inventory,
}

impl CrateRecord {
    /// A file resolver over this object's head version, for `load_file`
    /// fields.
    pub fn file_resolver(&self) -> ObjectFiles<'_> {
        ObjectFiles { record: self }
    }
}

/// Resolves logical paths through the record's inventory to absolute
/// physical paths.
pub struct ObjectFiles<'a> {
    record: &'a CrateRecord,
}

impl FileResolver for ObjectFiles<'_> {
    fn resolve(&self, logical: &str) -> Option<PathBuf> {
        let inventory = &self.record.inventory;
        let physical = inventory.resolve_content(&inventory.head, logical)?;
        Some(self.record.object_root.join(physical))
    }
}

/// Enumerate the repository and load every indexable record.
///
/// Only repository enumeration itself can fail; every per-object problem
/// (unreadable inventory, missing catalog, malformed JSON) downgrades to a
/// warning and skips that object.
pub fn load_records(repo_root: &Path, catalogs: &CatalogNames) -> RunnerResult<Vec<CrateRecord>> {
    let mut records = Vec::new();

    for object_root in find_objects(repo_root)? {
        info!(object = %object_root.display(), "loading ocfl object");
        let inventory = match load_inventory(&object_root) {
            Ok(inv) => inv,
            Err(e) => {
                warn!(object = %object_root.display(), error = %e, "skipping unreadable object");
                continue;
            }
        };

        let relative = object_root
            .strip_prefix(repo_root)
            .unwrap_or(&object_root)
            .to_string_lossy()
            .into_owned();

        match read_catalog(&object_root, &inventory, catalogs) {
            Some(json) => records.push(CrateRecord {
                hash_path: hash_path(&relative),
                path: relative,
                json,
                object_root,
                inventory,
            }),
            None => {
                warn!(object = %relative, "no catalog file in inventory; skipping");
            }
        }
    }

    info!(count = records.len(), "loaded records from repository");
    Ok(records)
}

/// Find the first configured catalog filename in the head version and
/// parse it.
fn read_catalog(object_root: &Path, inventory: &Inventory, catalogs: &CatalogNames) -> Option<Value> {
    for name in catalogs.iter() {
        let Some(physical) = inventory.resolve_content(&inventory.head, name) else {
            continue;
        };
        let path = object_root.join(physical);
        match std::fs::read(&path) {
            Ok(data) => match serde_json::from_slice(&data) {
                Ok(json) => return Some(json),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "catalog is not valid JSON");
                    return None;
                }
            },
            Err(e) => {
                warn!(file = %path.display(), error = %e, "error reading catalog");
                return None;
            }
        }
    }
    None
}

/// Stable opaque identifier for an object path.
pub fn hash_path(relative: &str) -> String {
    hex::encode(blake3::hash(relative.as_bytes()).as_bytes())
}
