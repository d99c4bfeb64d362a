//! govinfer error types

use thiserror::Error;

/// govinfer error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed sample: empty dataset, zero-row column, ragged columns
    #[error("Input error: {0}")]
    Input(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed data dictionary
    #[error("Dictionary error: {0}")]
    Dictionary(String),

    /// The assembled policy failed its own structural validation
    #[error("Internal invariant failure: {0}")]
    InternalInvariant(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for govinfer operations
pub type Result<T> = std::result::Result<T, Error>;
