//! Object resolution strategies.
//!
//! Mapping an opaque identifier to an object's location under the
//! repository root goes through one of two interchangeable strategies: the
//! deterministic pairtree transform, or a lookup against the search index
//! for repositories whose layout is recorded there.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use relic_solr::{escape_query, SelectParams, SolrClient};

/// Resolves an identifier to an object root path relative to the
/// repository root.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns `None` when the identifier cannot be resolved. Failures are
    /// logged here, not retried; retry policy belongs to the caller.
    async fn resolve(&self, oid: &str) -> Option<PathBuf>;
}

/// Deterministic pairtree resolution. Total: every identifier resolves.
pub struct PairtreeResolver;

#[async_trait]
impl Resolver for PairtreeResolver {
    async fn resolve(&self, oid: &str) -> Option<PathBuf> {
        Some(relic_pairtree::encode(oid).iter().collect())
    }
}

/// Search-index-backed resolution: a `uri_id` lookup expected to return
/// exactly one hit carrying the object's `path`.
pub struct SolrResolver {
    client: SolrClient,
}

impl SolrResolver {
    pub fn new(client: SolrClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for SolrResolver {
    async fn resolve(&self, oid: &str) -> Option<PathBuf> {
        let params =
            SelectParams::query(format!("uri_id:{}", escape_query(oid)), &["path"]);
        match self.client.select(&params).await {
            Ok(resp) if resp.docs.len() == 1 => match path_field(&resp.docs[0]) {
                Some(path) => Some(PathBuf::from(path)),
                None => {
                    warn!(oid, "index hit has no path field");
                    None
                }
            },
            Ok(resp) => {
                warn!(oid, hits = resp.docs.len(), "object id not found in index");
                None
            }
            Err(e) => {
                warn!(oid, error = %e, "object id lookup failed");
                None
            }
        }
    }
}

/// `path` may be stored single-valued or as a one-element array.
fn path_field(doc: &Value) -> Option<&str> {
    match doc.get("path")? {
        Value::String(s) => Some(s),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}
