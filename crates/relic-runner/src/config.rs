//! Runner configuration, loaded from the JSON config document.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

/// How `uri_id` is assigned on root-record documents.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub enum UriIdMode {
    /// Hash of the object's repository-relative path.
    #[default]
    #[serde(rename = "hashpaths")]
    HashPaths,
    /// The record's own id field.
    #[serde(rename = "dataset_id")]
    DatasetId,
}

/// The catalog file may be configured as one name or several candidates.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum CatalogNames {
    One(String),
    Many(Vec<String>),
}

impl CatalogNames {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        match self {
            Self::One(name) => std::slice::from_ref(name).iter().map(String::as_str),
            Self::Many(names) => names.as_slice().iter().map(String::as_str),
        }
    }
}

impl Default for CatalogNames {
    fn default() -> Self {
        Self::One("ro-crate-metadata.jsonld".into())
    }
}

/// Configuration for one indexing run.
#[derive(Clone, Debug, Deserialize)]
pub struct RunnerConfig {
    /// Search core base URL.
    pub solr_base: String,
    /// Repository storage root.
    pub ocfl: PathBuf,
    /// The field-mapping document (types, map_all, licenses,
    /// main_search).
    pub fields: Value,

    #[serde(default)]
    pub catalog_filename: CatalogNames,
    #[serde(default)]
    pub uri_ids: UriIdMode,
    /// Delete every existing document before indexing.
    #[serde(default)]
    pub purge: bool,
    /// Directory for document dumps and per-document failure dumps.
    #[serde(default)]
    pub dump: Option<PathBuf>,
    /// Document ids to leave out of the pass.
    #[serde(default)]
    pub skip: Vec<String>,
    /// Stop after this many delivered documents.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Seconds to sleep between documents.
    #[serde(default)]
    pub wait_interval: Option<f64>,

    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Seconds between health-check attempts.
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_true")]
    pub update_schema: bool,
    /// Base schema document the generated copy-fields are appended to.
    #[serde(default)]
    pub schema_base: Option<PathBuf>,
}

impl RunnerConfig {
    /// Source fields feeding the `main_search` catch-all, from the
    /// mapping document.
    pub fn main_search_fields(&self) -> Vec<String> {
        self.fields
            .get("main_search")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn default_retries() -> u32 {
    10
}

fn default_retry_interval() -> u64 {
    10
}

fn default_timeout() -> u64 {
    180
}

fn default_true() -> bool {
    true
}
