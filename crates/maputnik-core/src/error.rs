use thiserror::Error;

pub type Result<T> = std::result::Result<T, StyleError>;

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("style document must be a JSON object")]
    NotAnObject,

    #[error("layer index {index} out of range (layer count {len})")]
    LayerIndex { index: usize, len: usize },

    #[error("layer not found: {id}")]
    LayerNotFound { id: String },

    #[error("source already declared: {id}")]
    DuplicateSource { id: String },

    #[error("malformed path: {path}")]
    MalformedPath { path: String },

    #[error("unknown property group: {group}")]
    UnknownGroup { group: String },
}

impl StyleError {
    #[must_use]
    pub fn layer_index(index: usize, len: usize) -> Self {
        Self::LayerIndex { index, len }
    }

    #[must_use]
    pub fn malformed_path(path: impl Into<String>) -> Self {
        Self::MalformedPath { path: path.into() }
    }
}
