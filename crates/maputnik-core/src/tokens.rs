//! Access-token substitution for hosted tile services.
//!
//! Styles that point at a few well-known tile hosts carry a `{key}`
//! placeholder in their URLs. Before a style is handed to the renderer the
//! placeholder is replaced with a token resolved from, in order:
//!
//! 1. the style's own editor metadata (one key per [`TokenService`]), then
//! 2. the fallback [`TokenTable`], keyed by [`TokenProvider`].
//!
//! Both Thunderforest services resolve to the same fallback entry. A URL
//! whose service has no token keeps its placeholder.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::document::{Sprite, StyleDocument};
use crate::metadata::{EditorKey, StyleMetadata};

const BUILTIN_TOKENS: &str = include_str!("tokens.json");

const KEY_PLACEHOLDER: &str = "{key}";

/// Fallback table entries. Both Thunderforest services share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenProvider {
    OpenMapTiles,
    Thunderforest,
    LocationIq,
}

impl TokenProvider {
    /// Detect the provider from a URL's host.
    #[must_use]
    pub fn for_url(url: &str) -> Option<Self> {
        TokenService::for_url(url).map(TokenService::provider)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OpenMapTiles => "openmaptiles",
            Self::Thunderforest => "thunderforest",
            Self::LocationIq => "locationiq",
        }
    }
}

/// Tile services whose URLs accept an access token. Each one has its own
/// metadata override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenService {
    OpenMapTiles,
    ThunderforestTransport,
    ThunderforestOutdoors,
    LocationIq,
}

impl TokenService {
    /// Detect the service from a URL. Thunderforest URLs naming the
    /// `outdoors` style use the outdoors token; every other Thunderforest
    /// URL uses the transport token.
    #[must_use]
    pub fn for_url(url: &str) -> Option<Self> {
        if url.contains(".tilehosting.com") || url.contains(".maptiler.com") {
            Some(Self::OpenMapTiles)
        } else if url.contains(".thunderforest.com") {
            if url.contains("/outdoors") {
                Some(Self::ThunderforestOutdoors)
            } else {
                Some(Self::ThunderforestTransport)
            }
        } else if url.contains(".locationiq.com") {
            Some(Self::LocationIq)
        } else {
            None
        }
    }

    /// The metadata key that overrides the fallback token.
    #[must_use]
    pub const fn metadata_key(self) -> EditorKey {
        match self {
            Self::OpenMapTiles => EditorKey::OpenMapTilesAccessToken,
            Self::ThunderforestTransport => EditorKey::ThunderforestTransportAccessToken,
            Self::ThunderforestOutdoors => EditorKey::ThunderforestOutdoorsAccessToken,
            Self::LocationIq => EditorKey::LocationIqAccessToken,
        }
    }

    #[must_use]
    pub const fn provider(self) -> TokenProvider {
        match self {
            Self::OpenMapTiles => TokenProvider::OpenMapTiles,
            Self::ThunderforestTransport | Self::ThunderforestOutdoors => {
                TokenProvider::Thunderforest
            }
            Self::LocationIq => TokenProvider::LocationIq,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenFile {
    #[serde(default)]
    openmaptiles: String,
    #[serde(default)]
    thunderforest: String,
    #[serde(default)]
    locationiq: String,
}

/// Fallback tokens used when a style carries none of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenTable {
    entries: BTreeMap<TokenProvider, String>,
}

impl TokenTable {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The table shipped with the editor.
    #[must_use]
    pub fn builtin() -> Self {
        let file: TokenFile = serde_json::from_str(BUILTIN_TOKENS).unwrap_or_else(|err| {
            warn!(error = %err, "built-in token table unreadable");
            TokenFile::default()
        });
        Self::empty()
            .with_token(TokenProvider::OpenMapTiles, file.openmaptiles)
            .with_token(TokenProvider::Thunderforest, file.thunderforest)
            .with_token(TokenProvider::LocationIq, file.locationiq)
    }

    /// Set a provider's token. Empty tokens remove the entry.
    #[must_use]
    pub fn with_token(mut self, provider: TokenProvider, token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            self.entries.remove(&provider);
        } else {
            self.entries.insert(provider, token);
        }
        self
    }

    #[must_use]
    pub fn get(&self, provider: TokenProvider) -> Option<&str> {
        self.entries.get(&provider).map(String::as_str)
    }

    /// Resolve a token: style metadata first, then this table.
    #[must_use]
    pub fn resolve<'a>(
        &'a self,
        service: TokenService,
        metadata: &'a StyleMetadata,
    ) -> Option<&'a str> {
        metadata
            .editor_str(service.metadata_key())
            .or_else(|| self.get(service.provider()))
    }
}

/// Substitute the `{key}` placeholder of a single URL.
#[must_use]
pub fn substitute_url(url: &str, metadata: &StyleMetadata, table: &TokenTable) -> String {
    let Some(service) = TokenService::for_url(url) else {
        return url.to_string();
    };
    if !url.contains(KEY_PLACEHOLDER) {
        return url.to_string();
    }
    match table.resolve(service, metadata) {
        Some(token) => url.replacen(KEY_PLACEHOLDER, token, 1),
        None => url.to_string(),
    }
}

/// Substitute tokens in the glyph template, the sprite URL(s), and every
/// source URL.
#[must_use]
pub fn substitute_tokens(style: &StyleDocument, table: &TokenTable) -> StyleDocument {
    let mut out = style.clone();
    let metadata = &style.metadata;

    if let Some(glyphs) = &style.glyphs {
        out.glyphs = Some(substitute_url(glyphs, metadata, table));
    }

    out.sprite = match &style.sprite {
        None => None,
        Some(Sprite::Url(url)) => Some(Sprite::Url(substitute_url(url, metadata, table))),
        Some(Sprite::Sheets(sheets)) => Some(Sprite::Sheets(
            sheets
                .iter()
                .cloned()
                .map(|mut sheet| {
                    sheet.url = substitute_url(&sheet.url, metadata, table);
                    sheet
                })
                .collect(),
        )),
    };

    for (id, source) in style.sources.iter() {
        let Some(url) = &source.url else {
            continue;
        };
        let substituted = substitute_url(url, metadata, table);
        if &substituted != url {
            let mut source = source.clone();
            source.url = Some(substituted);
            out.sources.insert(id.clone(), source);
        }
    }
    out
}
