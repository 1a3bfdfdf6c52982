pub mod document;
pub mod error;
pub mod finding;

pub use document::{ValidationReport, load_config, parse_config, validate_config, validate_document};
pub use error::ConfigError;
pub use finding::{Finding, FindingKind, Severity};
