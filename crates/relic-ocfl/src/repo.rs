//! Repository configuration and the resolution request surface.
//!
//! [`Repository`] is what the HTTP front end (an external collaborator)
//! calls into: `resolve_file` and `resolve_index` turn logical requests
//! into physical paths or listings, reporting every storage failure as
//! not-found at this boundary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use relic_solr::SolrClient;

use crate::error::{OcflError, OcflResult};
use crate::inventory::{load_inventory, Entry};
use crate::resolver::{PairtreeResolver, Resolver, SolrResolver};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which resolution strategy a repository uses.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    #[default]
    Pairtree,
    Solr,
}

/// Per-repository configuration, from the JSON config document.
#[derive(Clone, Debug, Deserialize)]
pub struct RepoConfig {
    /// Storage root holding the object directories.
    pub repository: PathBuf,
    #[serde(default)]
    pub resolver: ResolverKind,
    /// Search core base URL, required for the index-backed resolver.
    #[serde(default)]
    pub solr: Option<String>,
    /// Whether listing requests are answered at all.
    #[serde(default)]
    pub autoindex: bool,
    /// Suffix pattern restricting which entry names listings expose.
    #[serde(default)]
    pub allow: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// An opened repository: config plus a ready resolver and compiled allow
/// pattern.
pub struct Repository {
    config: RepoConfig,
    resolver: Box<dyn Resolver>,
    allow: Option<Regex>,
}

impl Repository {
    /// Validate the config, compile its pattern, and set up the resolver.
    pub fn open(config: RepoConfig) -> OcflResult<Self> {
        let resolver: Box<dyn Resolver> = match config.resolver {
            ResolverKind::Pairtree => Box::new(PairtreeResolver),
            ResolverKind::Solr => {
                let base = config.solr.as_deref().ok_or_else(|| {
                    OcflError::Config("solr resolver configured without a solr URL".into())
                })?;
                let timeout =
                    Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
                Box::new(SolrResolver::new(SolrClient::new(base, timeout)?))
            }
        };
        let allow = match &config.allow {
            // The match is suffix-anchored: the config supplies the bare
            // pattern.
            Some(pattern) => Some(Regex::new(&format!("{pattern}$"))?),
            None => None,
        };
        Ok(Self { config, resolver, allow })
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.repository
    }

    /// Resolve an identifier to the object's absolute root directory.
    pub async fn resolve_object(&self, oid: &str) -> Option<PathBuf> {
        let relative = self.resolver.resolve(oid).await?;
        Some(self.config.repository.join(relative))
    }

    /// Resolve `{oid, version, content}` to the physical file path.
    ///
    /// Storage and resolution failures surface as `None`; details go to
    /// the log.
    pub async fn resolve_file(&self, oid: &str, version: &str, content: &str) -> Option<PathBuf> {
        let object_root = self.resolve_object(oid).await?;
        let inventory = match load_inventory(&object_root) {
            Ok(inv) => inv,
            Err(e) => {
                warn!(oid, error = %e, "could not load inventory");
                return None;
            }
        };
        let version = match inventory.locate_version(version) {
            Ok(v) => v,
            Err(e) => {
                warn!(oid, error = %e, "version not found");
                return None;
            }
        };
        match inventory.resolve_content(version, content) {
            Some(physical) => Some(object_root.join(physical)),
            None => {
                info!(oid, version, content, "content not found in inventory");
                None
            }
        }
    }

    /// Directory-style listing for a path prefix within an object.
    pub async fn resolve_index(
        &self,
        oid: &str,
        version: &str,
        prefix: &str,
    ) -> Option<Vec<Entry>> {
        let object_root = self.resolve_object(oid).await?;
        let inventory = match load_inventory(&object_root) {
            Ok(inv) => inv,
            Err(e) => {
                warn!(oid, error = %e, "could not load inventory");
                return None;
            }
        };
        let version = match inventory.locate_version(version) {
            Ok(v) => v.to_string(),
            Err(e) => {
                warn!(oid, error = %e, "version not found");
                return None;
            }
        };
        inventory.autoindex(&version, prefix, self.allow.as_ref())
    }
}

/// Enumerate every object root under a repository root: any directory
/// holding an `inventory.json`. Matched directories are not descended
/// into, so inventories shipped as object *content* are not mistaken for
/// objects. Results are sorted for a stable processing order.
pub fn find_objects(root: &Path) -> OcflResult<Vec<PathBuf>> {
    let mut objects = Vec::new();
    let mut walker = WalkDir::new(root).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| {
            OcflError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
            }))
        })?;
        if entry.file_type().is_dir() && entry.path().join("inventory.json").is_file() {
            objects.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }
    objects.sort();
    Ok(objects)
}
