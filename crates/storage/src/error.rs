use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object name: {0}")]
    InvalidName(String),

    #[error("No storage provider found for scheme `{scheme}` in `{location}`")]
    UnknownScheme { scheme: String, location: String },

    #[error("Writer is closed")]
    WriterClosed,

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Storage operation timed out: {0}")]
    Timeout(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::NotFound(_) => true,
            StorageError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
