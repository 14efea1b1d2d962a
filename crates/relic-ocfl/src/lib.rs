//! Access to OCFL-layout repositories.
//!
//! An OCFL repository is a directory tree holding one subdirectory per
//! versioned object. Each object carries an `inventory.json` manifest
//! mapping logical paths to content digests and digests to physical paths.
//! This crate resolves logical `{object, version, content}` requests into
//! physical file locations or directory-style listings, using either a
//! deterministic pairtree transform or a search-index-backed lookup to find
//! the object root.

pub mod error;
pub mod inventory;
pub mod repo;
pub mod resolver;

pub use error::{OcflError, OcflResult};
pub use inventory::{load_inventory, Entry, Inventory};
pub use repo::{find_objects, RepoConfig, Repository, ResolverKind};
pub use resolver::{PairtreeResolver, Resolver, SolrResolver};
