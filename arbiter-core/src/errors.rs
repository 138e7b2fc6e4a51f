use std::io;

use thiserror::Error;

/// Result type used across the Arbiter core crate.
pub type Result<T> = std::result::Result<T, ArbiterError>;

/// Canonical error representation shared by the engine and its tools.
#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("rule error: {0}")]
    Rules(String),

    #[error("{0}")]
    General(String),
}

impl From<serde_json::Error> for ArbiterError {
    fn from(err: serde_json::Error) -> Self {
        ArbiterError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ArbiterError {
    fn from(err: anyhow::Error) -> Self {
        ArbiterError::General(err.to_string())
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable is missing: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for environment variable {key}: {value:?}")]
    InvalidEnvVar { key: String, value: String },
}

impl From<ConfigError> for ArbiterError {
    fn from(value: ConfigError) -> Self {
        ArbiterError::Config(value.to_string())
    }
}
