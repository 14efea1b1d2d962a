/// Errors from Solr client operations.
#[derive(Debug, thiserror::Error)]
pub enum SolrError {
    /// Transport-level failure (connection refused, timeout, bad URL).
    #[error("solr transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Solr answered with a non-success status code.
    #[error("solr returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("unexpected solr response: {0}")]
    Unexpected(String),
}

/// Result alias for Solr client operations.
pub type SolrResult<T> = Result<T, SolrError>;
