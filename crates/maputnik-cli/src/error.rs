use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

/// Exit code for documents that fail validation.
pub const EXIT_VALIDATION: i32 = 2;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Style(#[from] maputnik_core::StyleError),

    #[error(transparent)]
    Editor(#[from] maputnik_runtime::EditorError),

    #[error(transparent)]
    Config(#[from] maputnik_runtime::ConfigError),

    #[error(transparent)]
    Fetch(#[from] maputnik_runtime::FetchError),

    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("{count} validation error(s) found")]
    ValidationFailed { count: usize },
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ValidationFailed { .. } => EXIT_VALIDATION,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
