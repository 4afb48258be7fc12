//! Typed style metadata.
//!
//! A style's `metadata` object is free-form JSON shared between the style
//! author and the editor. The editor stores its private flags there under a
//! `maputnik:` prefix. [`StyleMetadata`] splits the two: user entries stay an
//! open JSON map, while editor entries are keyed by the closed [`EditorKey`]
//! enum so that a typo cannot silently create a new flag.
//!
//! On the wire both halves serialise into a single flat JSON object, so a
//! round trip through [`serde_json`] preserves the original document.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Editor-private metadata keys recognised by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditorKey {
    OpenMapTilesAccessToken,
    ThunderforestTransportAccessToken,
    ThunderforestOutdoorsAccessToken,
    LocationIqAccessToken,
    Renderer,
    FloorFilter,
}

impl EditorKey {
    pub const ALL: [EditorKey; 6] = [
        EditorKey::OpenMapTilesAccessToken,
        EditorKey::ThunderforestTransportAccessToken,
        EditorKey::ThunderforestOutdoorsAccessToken,
        EditorKey::LocationIqAccessToken,
        EditorKey::Renderer,
        EditorKey::FloorFilter,
    ];

    /// The JSON key this entry is stored under.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenMapTilesAccessToken => "maputnik:openmaptiles_access_token",
            Self::ThunderforestTransportAccessToken => {
                "maputnik:thunderforest_transport_access_token"
            }
            Self::ThunderforestOutdoorsAccessToken => {
                "maputnik:thunderforest_outdoors_access_token"
            }
            Self::LocationIqAccessToken => "maputnik:locationiq_access_token",
            Self::Renderer => "maputnik:renderer",
            Self::FloorFilter => "maputnik:floor_filter",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }

    #[must_use]
    pub const fn is_access_token(self) -> bool {
        matches!(
            self,
            Self::OpenMapTilesAccessToken
                | Self::ThunderforestTransportAccessToken
                | Self::ThunderforestOutdoorsAccessToken
                | Self::LocationIqAccessToken
        )
    }
}

impl fmt::Display for EditorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Style metadata split into user entries and editor-private entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleMetadata {
    user: Map<String, Value>,
    editor: BTreeMap<EditorKey, Value>,
}

impl StyleMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a flat JSON map into user and editor entries.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut metadata = Self::new();
        for (key, value) in map {
            match EditorKey::from_key(&key) {
                Some(editor_key) => {
                    metadata.editor.insert(editor_key, value);
                }
                None => {
                    metadata.user.insert(key, value);
                }
            }
        }
        metadata
    }

    /// Flatten back into the on-disk JSON shape.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.user.clone();
        for (key, value) in &self.editor {
            map.insert(key.as_str().to_string(), value.clone());
        }
        map
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.editor.is_empty()
    }

    #[must_use]
    pub fn user(&self) -> &Map<String, Value> {
        &self.user
    }

    pub fn set_user(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        // Known editor keys always land in the typed half.
        match EditorKey::from_key(&key) {
            Some(editor_key) => self.set_editor(editor_key, value),
            None => {
                self.user.insert(key, value);
            }
        }
    }

    pub fn remove_user(&mut self, key: &str) -> Option<Value> {
        self.user.remove(key)
    }

    #[must_use]
    pub fn editor(&self, key: EditorKey) -> Option<&Value> {
        self.editor.get(&key)
    }

    /// Editor entry as a non-empty string.
    #[must_use]
    pub fn editor_str(&self, key: EditorKey) -> Option<&str> {
        self.editor
            .get(&key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn set_editor(&mut self, key: EditorKey, value: Value) {
        self.editor.insert(key, value);
    }

    pub fn remove_editor(&mut self, key: EditorKey) -> Option<Value> {
        self.editor.remove(&key)
    }

    /// Remove every access token, keeping other editor flags.
    pub fn strip_access_tokens(&mut self) {
        self.editor.retain(|key, _| !key.is_access_token());
    }

    /// Remove every editor-private entry.
    pub fn clear_editor(&mut self) {
        self.editor.clear();
    }

    pub fn editor_keys(&self) -> impl Iterator<Item = EditorKey> + '_ {
        self.editor.keys().copied()
    }
}

impl Serialize for StyleMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StyleMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_map(map))
    }
}
