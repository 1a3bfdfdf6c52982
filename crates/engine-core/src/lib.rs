pub mod bitmap;
pub mod error;
pub mod metrics;
pub mod progress;
