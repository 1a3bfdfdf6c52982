pub mod chain;
pub mod error;
pub mod pipe;
pub mod transform;

pub use chain::{ChainStats, TransformChain};
pub use error::{ChainError, TransformError};
pub use pipe::{PIPE_DEPTH, PipeClosed, PipeReader, PipeWriter, pipe};
pub use transform::{StageInput, StageOutput, StageStats, Transform, build_chain};
