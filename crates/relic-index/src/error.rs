/// Errors from rule compilation.
///
/// All of these are fatal at startup: no indexing happens with a broken
/// configuration. Per-document failures during indexing are accumulated and
/// logged instead (see [`crate::indexer`]).
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Malformed or ambiguous field configuration.
    #[error("invalid field configuration: {0}")]
    Config(String),

    /// A configured pattern does not compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    /// For consistency with schema.org this codebase uses the US spelling
    /// of "license"; rather than silently not applying one, configs using
    /// the "licence" spelling are rejected outright.
    #[error("config uses the 'licence' spelling of 'license' in types: {0}")]
    LicenceSpelling(String),
}

/// Result alias for rule compilation.
pub type IndexResult<T> = Result<T, IndexError>;
