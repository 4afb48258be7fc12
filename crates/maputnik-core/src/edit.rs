//! Whole-document edits.
//!
//! Each function takes the current document and returns the candidate a UI
//! action would hand to the store. The input is never modified; persistent
//! collections keep the copies cheap.

use serde_json::Value;

use crate::document::{Layer, SourceDescriptor, StyleDocument};
use crate::error::{Result, StyleError};
use crate::metadata::EditorKey;

/// Property groups of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyGroup {
    Paint,
    Layout,
}

impl PropertyGroup {
    pub fn parse(group: &str) -> Result<Self> {
        match group {
            "paint" => Ok(Self::Paint),
            "layout" => Ok(Self::Layout),
            other => Err(StyleError::UnknownGroup {
                group: other.to_string(),
            }),
        }
    }
}

fn checked_index(style: &StyleDocument, index: usize) -> Result<()> {
    if index < style.layers.len() {
        Ok(())
    } else {
        Err(StyleError::layer_index(index, style.layers.len()))
    }
}

/// Insert `layer` at `index`, or append when `index` is `None`.
pub fn add_layer(
    style: &StyleDocument,
    layer: Layer,
    index: Option<usize>,
) -> Result<StyleDocument> {
    let mut out = style.clone();
    match index {
        None => out.layers.push_back(layer),
        Some(index) if index <= out.layers.len() => out.layers.insert(index, layer),
        Some(index) => return Err(StyleError::layer_index(index, out.layers.len())),
    }
    Ok(out)
}

pub fn delete_layer(style: &StyleDocument, index: usize) -> Result<StyleDocument> {
    checked_index(style, index)?;
    let mut out = style.clone();
    out.layers.remove(index);
    Ok(out)
}

/// Copy the layer at `index` directly above it with a fresh `-copy` id.
pub fn duplicate_layer(style: &StyleDocument, index: usize) -> Result<StyleDocument> {
    checked_index(style, index)?;
    let mut copy = style.layers[index].clone();
    copy.id = Some(unique_layer_id(style, &format!("{}-copy", copy.id())));
    let mut out = style.clone();
    out.layers.insert(index + 1, copy);
    Ok(out)
}

fn unique_layer_id(style: &StyleDocument, base: &str) -> String {
    if style.layer_index(base).is_none() {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| style.layer_index(candidate).is_none())
        .unwrap_or_else(|| base.to_string())
}

/// Move a layer from `from` to position `to` in the z-order.
pub fn move_layer(style: &StyleDocument, from: usize, to: usize) -> Result<StyleDocument> {
    checked_index(style, from)?;
    checked_index(style, to)?;
    let mut out = style.clone();
    let layer = out.layers.remove(from);
    out.layers.insert(to, layer);
    Ok(out)
}

pub fn rename_layer(
    style: &StyleDocument,
    index: usize,
    id: impl Into<String>,
) -> Result<StyleDocument> {
    checked_index(style, index)?;
    let mut out = style.clone();
    out.layers[index].id = Some(id.into());
    Ok(out)
}

/// Set one paint or layout property. `None` removes it; an emptied group is dropped.
pub fn set_layer_property(
    style: &StyleDocument,
    index: usize,
    group: PropertyGroup,
    name: &str,
    value: Option<Value>,
) -> Result<StyleDocument> {
    checked_index(style, index)?;
    let mut out = style.clone();
    let layer = &mut out.layers[index];
    let properties = match group {
        PropertyGroup::Paint => &mut layer.paint,
        PropertyGroup::Layout => &mut layer.layout,
    };
    match value {
        Some(value) => {
            properties
                .get_or_insert_with(serde_json::Map::new)
                .insert(name.to_string(), value);
        }
        None => {
            if let Some(map) = properties.as_mut() {
                map.remove(name);
                if map.is_empty() {
                    *properties = None;
                }
            }
        }
    }
    Ok(out)
}

pub fn set_layer_filter(
    style: &StyleDocument,
    index: usize,
    filter: Option<Value>,
) -> Result<StyleDocument> {
    checked_index(style, index)?;
    let mut out = style.clone();
    out.layers[index].filter = filter;
    Ok(out)
}

pub fn add_source(
    style: &StyleDocument,
    id: impl Into<String>,
    source: SourceDescriptor,
) -> Result<StyleDocument> {
    let id = id.into();
    if style.sources.contains_key(&id) {
        return Err(StyleError::DuplicateSource { id });
    }
    let mut out = style.clone();
    out.sources.insert(id, source);
    Ok(out)
}

/// Remove a source. Layers that use it are kept; validation reports them.
#[must_use]
pub fn remove_source(style: &StyleDocument, id: &str) -> StyleDocument {
    let mut out = style.clone();
    out.sources.remove(id);
    out
}

/// Set a user metadata entry. Editor keys are routed to their typed slot;
/// `None` removes the entry.
#[must_use]
pub fn set_metadata(style: &StyleDocument, key: &str, value: Option<Value>) -> StyleDocument {
    let mut out = style.clone();
    match (value, EditorKey::from_key(key)) {
        (Some(value), _) => out.metadata.set_user(key, value),
        (None, Some(editor_key)) => {
            out.metadata.remove_editor(editor_key);
        }
        (None, None) => {
            out.metadata.remove_user(key);
        }
    }
    out
}
