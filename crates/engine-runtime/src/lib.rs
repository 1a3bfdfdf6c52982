pub mod context;
pub mod deadline;
pub mod error;
pub mod runner;

pub use context::{DEFAULT_OP_TIMEOUT, ProgressFn, RunContext, RunOptions};
pub use deadline::DeadlineStore;
pub use error::RunError;
pub use runner::{run_pipeline, run_pipeline_loop};
