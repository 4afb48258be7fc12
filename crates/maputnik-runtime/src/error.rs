use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, EditorError>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a PMTiles v3 archive: {url}")]
    InvalidArchive { url: String },

    #[error("unsupported PMTiles compression {code} in {url}")]
    UnsupportedCompression { url: String, code: u8 },

    #[error("no response registered for {url}")]
    NotFound { url: String },
}

impl FetchError {
    #[must_use]
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }
}

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Style(#[from] maputnik_core::StyleError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not load style from {url}: {source}")]
    RemoteStyle {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("could not read {path}: {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid address: {0}")]
    Address(#[from] url::ParseError),
}

impl EditorError {
    #[must_use]
    pub fn remote(url: impl Into<String>, source: FetchError) -> Self {
        Self::RemoteStyle {
            url: url.into(),
            source,
        }
    }

    /// True when the error came from the storage backend.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_names_url() {
        let error = EditorError::remote(
            "https://example.com/style.json",
            FetchError::status("https://example.com/style.json", 404),
        );
        let message = error.to_string();
        assert!(message.contains("https://example.com/style.json"));
        assert!(message.contains("404"));
    }

    #[test]
    fn storage_errors_convert() {
        let error: EditorError = StorageError::QuotaExceeded { key: "k".into() }.into();
        assert!(error.is_storage());
    }
}
