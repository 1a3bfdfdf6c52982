use storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BitmapError {
    #[error("Bit index {index} out of range for bitmap of {size} bits")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Inconsistent bitmap lengths during merge: {left} vs {right}")]
    SizeMismatch { left: usize, right: usize },

    #[error("Snapshot payload truncated: {0} bytes")]
    Truncated(usize),

    #[error("Snapshot payload of {payload} bytes does not match a bitmap of {size} bits")]
    LengthMismatch { payload: usize, size: usize },
}

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("Failed to list state location: {0}")]
    List(#[source] StorageError),

    #[error("Failed to write progress snapshot `{name}`: {source}")]
    WriteSnapshot {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("Cannot write a progress snapshot before a batch was claimed")]
    NoWorkerId,

    #[error(transparent)]
    Bitmap(#[from] BitmapError),
}
