use engine_core::error::ProgressError;
use engine_processing::{ChainError, TransformError};
use storage::StorageError;
use thiserror::Error;

/// Top-level errors for a pipeline run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Transform configuration rejected while building the chain.
    #[error("Transform configuration error: {0}")]
    Transform(#[from] TransformError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Progress state error: {0}")]
    Progress(#[from] ProgressError),

    /// One object's chain failed; the claimed batch stays unmarked and a
    /// later claim redoes it.
    #[error("Copying object `{name}` failed: {source}")]
    Object {
        name: String,
        #[source]
        source: ChainError,
    },

    /// A worker or per-object task was cancelled or panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
