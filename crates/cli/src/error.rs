use engine_config::ConfigError;
use engine_runtime::RunError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to load the configuration file: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to run the pipeline: {0}")]
    Runner(#[from] RunError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration is invalid; see the findings in the report")]
    ValidationFailed,
}
