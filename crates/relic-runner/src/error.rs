/// Errors that abort a run (or its setup).
///
/// Per-document and per-object failures are deliberately *not* here: they
/// are logged, optionally dumped, and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The runner configuration is unusable.
    #[error("runner config error: {0}")]
    Config(String),

    /// The field-mapping configuration failed to compile.
    #[error(transparent)]
    Rules(#[from] relic_index::IndexError),

    /// The search engine never answered the pre-run health check.
    #[error("search engine unavailable after health check retries")]
    EngineUnavailable,

    /// A search engine operation outside per-document delivery failed
    /// (purge, schema update).
    #[error(transparent)]
    Solr(#[from] relic_solr::SolrError),

    /// Repository enumeration failed outright.
    #[error(transparent)]
    Ocfl(#[from] relic_ocfl::OcflError),

    /// I/O on configuration or schema files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in configuration or schema files.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
