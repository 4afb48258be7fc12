#![forbid(unsafe_code)]

//! Network access used by the store and the source resolver.
//!
//! [`Fetcher`] is `Send + Sync` so fetches can run on worker threads.
//! [`HttpFetcher`] is the production implementation; [`StaticFetcher`] serves
//! canned responses for tests and offline use.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::RANGE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FetchError;

pub type FetchResult<T> = std::result::Result<T, FetchError>;

pub trait Fetcher: Send + Sync {
    /// GET `url` and parse the body as JSON.
    fn fetch_json(&self, url: &str) -> FetchResult<Value>;

    /// GET `len` bytes of `url` starting at `offset`.
    fn fetch_range(&self, url: &str, offset: u64, len: u64) -> FetchResult<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 2,
            user_agent: concat!("maputnik/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        self.client.get(url)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_json(&self, url: &str) -> FetchResult<Value> {
        debug!(url, "fetching JSON");
        let response = self.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(url, status.as_u16()));
        }
        Ok(response.json()?)
    }

    fn fetch_range(&self, url: &str, offset: u64, len: u64) -> FetchResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let end = offset + len - 1;
        debug!(url, offset, len, "fetching byte range");
        let response = self
            .get(url)
            .header(RANGE, format!("bytes={offset}-{end}"))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(url, status.as_u16()));
        }
        let full_body = status != reqwest::StatusCode::PARTIAL_CONTENT;
        let mut body = Vec::new();
        response.take(if full_body { offset + len } else { len }).read_to_end(&mut body)?;
        // Servers that ignore Range send the whole resource.
        if full_body {
            let start = usize::try_from(offset).unwrap_or(usize::MAX).min(body.len());
            body.drain(..start);
        }
        Ok(body)
    }
}

/// Serves registered JSON documents and byte blobs by URL.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    json: HashMap<String, Value>,
    bytes: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_json(mut self, url: impl Into<String>, value: Value) -> Self {
        self.json.insert(url.into(), value);
        self
    }

    #[must_use]
    pub fn with_bytes(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.bytes.insert(url.into(), bytes);
        self
    }
}

impl Fetcher for StaticFetcher {
    fn fetch_json(&self, url: &str) -> FetchResult<Value> {
        self.json
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                url: url.to_string(),
            })
    }

    fn fetch_range(&self, url: &str, offset: u64, len: u64) -> FetchResult<Vec<u8>> {
        let bytes = self.bytes.get(url).ok_or_else(|| FetchError::NotFound {
            url: url.to_string(),
        })?;
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(bytes.len());
        let end = usize::try_from(offset.saturating_add(len))
            .unwrap_or(usize::MAX)
            .min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn static_fetcher_serves_registered_json() {
        let fetcher = StaticFetcher::new().with_json("https://a/x.json", json!({"ok": true}));
        assert_eq!(fetcher.fetch_json("https://a/x.json").unwrap(), json!({"ok": true}));
        assert!(matches!(
            fetcher.fetch_json("https://a/y.json"),
            Err(FetchError::NotFound { .. })
        ));
    }

    #[test]
    fn static_fetcher_clamps_ranges() {
        let fetcher = StaticFetcher::new().with_bytes("pm", (0u8..10).collect());
        assert_eq!(fetcher.fetch_range("pm", 2, 3).unwrap(), vec![2, 3, 4]);
        assert_eq!(fetcher.fetch_range("pm", 8, 5).unwrap(), vec![8, 9]);
        assert!(fetcher.fetch_range("pm", 20, 5).unwrap().is_empty());
    }

    #[test]
    fn default_config_has_user_agent() {
        let config = FetchConfig::default();
        assert!(config.user_agent.starts_with("maputnik/"));
        assert!(HttpFetcher::new(&config).is_ok());
    }
}
