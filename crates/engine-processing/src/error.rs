use crate::pipe::PipeClosed;
use storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Invalid transform configuration: {0}")]
    InvalidConfig(String),

    #[error("Transform chain is empty")]
    EmptyChain,

    #[error("Gzip stream error: {0}")]
    Gzip(String),

    #[error("Malformed encrypted stream: {0}")]
    Cipher(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Pipe(#[from] PipeClosed),
}

impl TransformError {
    /// A closed pipe is the symptom of a neighbor stage failing, never the
    /// root cause; error selection prefers anything else over these.
    pub fn is_pipe_disconnect(&self) -> bool {
        matches!(self, TransformError::Pipe(_))
    }
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("Stage task failed to join: {0}")]
    Join(#[from] tokio::task::JoinError),
}
