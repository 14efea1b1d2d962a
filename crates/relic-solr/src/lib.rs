//! Thin client for the Solr HTTP API.
//!
//! Covers exactly the surface the bridge needs: ping/health-check with
//! bounded retries, `select` queries, document update + commit, a full
//! purge, and idempotent schema management. Every operation other than
//! [`SolrClient::health_check`] is single-attempt; retry policy belongs
//! to the caller.

pub mod client;
pub mod error;
pub mod schema;

pub use client::{escape_query, SelectParams, SelectResponse, SolrClient};
pub use error::{SolrError, SolrResult};
pub use schema::{build_schema, FieldKind};
