use std::path::PathBuf;

/// Errors from OCFL repository access.
#[derive(Debug, thiserror::Error)]
pub enum OcflError {
    /// The object has no inventory at the expected location.
    #[error("inventory not found at {0}")]
    InventoryNotFound(PathBuf),

    /// The inventory exists but cannot be decoded or is inconsistent.
    #[error("invalid inventory: {0}")]
    Parse(String),

    /// The requested version is not present in the inventory.
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    /// A configured pattern does not compile.
    #[error("invalid allow pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The repository configuration is incomplete or contradictory.
    #[error("repository config error: {0}")]
    Config(String),

    /// The search client could not be constructed or used.
    #[error("search client error: {0}")]
    Solr(#[from] relic_solr::SolrError),

    /// I/O error from the storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for OCFL operations.
pub type OcflResult<T> = Result<T, OcflError>;
