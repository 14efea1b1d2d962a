/// Errors from graph loading.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The record is not a graph document (missing or malformed `@graph`).
    #[error("malformed graph document: {0}")]
    Malformed(String),

    /// No entity could be identified as the graph's root.
    #[error("no root entity found in graph")]
    NoRootFound,
}

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;
