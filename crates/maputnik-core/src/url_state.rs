//! UI position in the address bar.
//!
//! The selected layer, the open modals, and the view mode are mirrored into
//! three query parameters so a reload restores the session:
//!
//! | parameter | value |
//! |-----------|-------|
//! | `layer`   | `<document hash>~<layer index>` |
//! | `modal`   | comma-separated modal names, omitted when none is open |
//! | `view`    | `inspect`, omitted for the default map view |
//!
//! The layer index is only trusted on decode when the stored hash matches
//! the loaded document (or is the `-` wildcard): a document that changed
//! shape since the URL was written could otherwise select the wrong layer.
//! Other query parameters, such as `style`, are left alone.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hasher;

use rustc_hash::FxHasher;
use tracing::{debug, warn};
use url::Url;

use crate::document::StyleDocument;
use crate::error::Result;

const LAYER_PARAM: &str = "layer";
const MODAL_PARAM: &str = "modal";
const VIEW_PARAM: &str = "view";
const ANY_HASH: &str = "-";

/// Hash of a document's canonical JSON serialisation, as lowercase hex.
pub fn style_hash(style: &StyleDocument) -> Result<String> {
    let bytes = serde_json::to_vec(style)?;
    let mut hasher = FxHasher::default();
    hasher.write(&bytes);
    Ok(format!("{:x}", hasher.finish()))
}

/// Modal dialogs whose open state is kept in the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modal {
    Add,
    Export,
    Open,
    Shortcuts,
    Settings,
    Sources,
    Debug,
}

impl Modal {
    pub const ALL: [Modal; 7] = [
        Modal::Add,
        Modal::Export,
        Modal::Open,
        Modal::Shortcuts,
        Modal::Settings,
        Modal::Sources,
        Modal::Debug,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Export => "export",
            Self::Open => "open",
            Self::Shortcuts => "shortcuts",
            Self::Settings => "settings",
            Self::Sources => "sources",
            Self::Debug => "debug",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Modal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Map,
    Inspect,
}

/// The browser address bar, or whatever stands in for it.
pub trait AddressBar {
    fn current(&self) -> Url;
    /// Replace the current entry without adding a history entry.
    fn replace(&mut self, url: Url);
}

/// In-memory address bar for headless sessions and tests.
#[derive(Debug, Clone)]
pub struct MemoryAddressBar {
    url: Url,
    replacements: usize,
}

impl MemoryAddressBar {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            replacements: 0,
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// How many times the URL was replaced.
    #[must_use]
    pub fn replacements(&self) -> usize {
        self.replacements
    }
}

impl AddressBar for MemoryAddressBar {
    fn current(&self) -> Url {
        self.url.clone()
    }

    fn replace(&mut self, url: Url) {
        self.url = url;
        self.replacements += 1;
    }
}

/// Write the UI position into the address bar.
pub fn encode_url_state(
    bar: &mut dyn AddressBar,
    style: &StyleDocument,
    selected_layer: usize,
    open_modals: &BTreeSet<Modal>,
    view_mode: ViewMode,
) -> Result<()> {
    let hash = style_hash(style)?;
    let mut url = bar.current();

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !matches!(key.as_ref(), LAYER_PARAM | MODAL_PARAM | VIEW_PARAM))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(&kept);
        query.append_pair(LAYER_PARAM, &format!("{hash}~{selected_layer}"));
        if !open_modals.is_empty() {
            let names: Vec<_> = open_modals.iter().map(|m| m.as_str()).collect();
            query.append_pair(MODAL_PARAM, &names.join(","));
        }
        if view_mode == ViewMode::Inspect {
            query.append_pair(VIEW_PARAM, "inspect");
        }
    }

    bar.replace(url);
    Ok(())
}

/// A layer selection restored from the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSelection {
    pub index: usize,
    /// Id of the selected layer when the session was restored.
    pub original_id: String,
}

/// UI position read back from the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedUrlState {
    pub modals: BTreeSet<Modal>,
    /// `None` when the URL does not mention a view.
    pub view_mode: Option<ViewMode>,
    /// `None` when absent, malformed, or written for a different document.
    pub layer: Option<LayerSelection>,
}

/// Read the UI position from `url` against the freshly loaded `style`.
///
/// Never fails: anything unreadable is logged and left out.
#[must_use]
pub fn decode_url_state(url: &Url, style: &StyleDocument) -> DecodedUrlState {
    let mut state = DecodedUrlState::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            MODAL_PARAM => {
                for name in value.split(',').filter(|n| !n.is_empty()) {
                    match Modal::parse(name) {
                        Some(modal) => {
                            state.modals.insert(modal);
                        }
                        None => warn!(modal = name, "ignoring unknown modal in URL"),
                    }
                }
            }
            VIEW_PARAM => {
                state.view_mode = Some(if value == "inspect" {
                    ViewMode::Inspect
                } else {
                    ViewMode::Map
                });
            }
            LAYER_PARAM => state.layer = decode_layer(&value, style),
            _ => {}
        }
    }
    state
}

fn decode_layer(value: &str, style: &StyleDocument) -> Option<LayerSelection> {
    let Some((hash, index)) = value.split_once('~') else {
        warn!(value, "malformed layer parameter");
        return None;
    };
    let index: usize = match index.parse() {
        Ok(index) => index,
        Err(err) => {
            warn!(value, error = %err, "malformed layer index");
            return None;
        }
    };

    if hash != ANY_HASH {
        match style_hash(style) {
            Ok(current) if current == hash => {}
            Ok(_) => {
                debug!(index, "style changed since URL was written; ignoring layer");
                return None;
            }
            Err(err) => {
                warn!(error = %err, "cannot hash style");
                return None;
            }
        }
    }

    let Some(layer) = style.layer(index) else {
        warn!(index, "layer index from URL out of range");
        return None;
    };
    Some(LayerSelection {
        index,
        original_id: layer.id().to_string(),
    })
}
