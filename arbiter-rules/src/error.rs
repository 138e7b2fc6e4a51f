use std::path::PathBuf;

use arbiter_core::ArbiterError;
use thiserror::Error;

/// Errors returned by the rules engine when building, loading or dispatching rules.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("a composite rule requires at least one child rule")]
    EmptyComposite,
    #[error("rules path does not exist: {0}")]
    MissingPath(String),
    #[error("failed to read rules from {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules from {source_name} (line {line}): {message}")]
    Parse {
        source_name: String,
        line: usize,
        message: String,
    },
    #[error("rule block starting at line {line} is missing required field `{field}`")]
    MissingField { line: usize, field: &'static str },
    #[error("duplicate rule identifier detected: {id}")]
    DuplicateRule { id: String },
    #[error("async rule `{rule_id}` was cancelled before completion")]
    Cancelled { rule_id: String },
}

impl RuleError {
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RuleError::Io {
            path: path.into().display().to_string(),
            source,
        }
    }

    pub fn parse_error(
        source_name: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        RuleError::Parse {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    /// Whether the error signals a cancelled async dispatch.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RuleError::Cancelled { .. })
    }
}

impl From<RuleError> for ArbiterError {
    fn from(err: RuleError) -> Self {
        match err {
            RuleError::Io { source, .. } => ArbiterError::Io(source),
            other => ArbiterError::Rules(other.to_string()),
        }
    }
}
