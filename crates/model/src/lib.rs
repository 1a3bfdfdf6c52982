pub mod config;
pub mod location;
pub mod summary;
pub mod transform;
