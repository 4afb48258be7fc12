#![forbid(unsafe_code)]

//! Editor configuration loaded from TOML or JSON.
//!
//! # Loading
//!
//! ```toml
//! # maputnik.toml
//! [history]
//! max_depth = 200
//!
//! [storage]
//! dir = "/var/lib/maputnik"
//!
//! [tokens]
//! openmaptiles = "my-key"
//! ```
//!
//! ```rust,ignore
//! let config = EditorConfig::from_toml_file("maputnik.toml")?;
//! ```
//!
//! # Defaults
//!
//! `EditorConfig::default()` reproduces the built-in behaviour: unlimited
//! history, in-memory storage, the bundled token table.

use std::path::{Path, PathBuf};

use maputnik_core::{TokenProvider, TokenTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::fetch::FetchConfig;
use crate::history::HistoryConfig;

pub const DEFAULT_BASE_URL: &str = "https://maplibre.org/maputnik/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub history: HistoryConfig,
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub tokens: TokenOverrides,
    pub address: AddressConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for file-backed storage. `None` keeps styles in memory.
    pub dir: Option<PathBuf>,
    /// Byte quota for in-memory storage.
    pub quota_bytes: Option<usize>,
}

/// Replacement fallback tokens; unset entries keep the bundled value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenOverrides {
    pub openmaptiles: Option<String>,
    pub thunderforest: Option<String>,
    pub locationiq: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    /// Address bar URL a headless session starts from.
    pub base_url: String,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Parameter problems; empty when the config is usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.history.max_depth == Some(0) {
            errors.push("history.max_depth must be at least 1".to_string());
        }
        if self.fetch.timeout_secs == 0 {
            errors.push("fetch.timeout_secs must be at least 1".to_string());
        }
        if let Err(err) = Url::parse(&self.address.base_url) {
            errors.push(format!("address.base_url: {err}"));
        }
        errors
    }

    /// Fail with every problem [`validate`](Self::validate) found.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// The bundled token table with the configured overrides applied.
    #[must_use]
    pub fn token_table(&self) -> TokenTable {
        let mut table = TokenTable::builtin();
        let overrides = [
            (TokenProvider::OpenMapTiles, &self.tokens.openmaptiles),
            (TokenProvider::Thunderforest, &self.tokens.thunderforest),
            (TokenProvider::LocationIq, &self.tokens.locationiq),
        ];
        for (provider, token) in overrides {
            if let Some(token) = token {
                table = table.with_token(provider, token.clone());
            }
        }
        table
    }

    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.address.base_url)
    }
}
