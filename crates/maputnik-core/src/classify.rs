//! Classification of validator messages.
//!
//! Validator output is free text. Messages that address a single layer are
//! mapped to a [`LayerError`] so the property editor can highlight the field;
//! everything else stays an unstructured [`ValidationError`].

use std::sync::LazyLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::document::Layer;

static DUPLICATE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^layers\[(\d+)\]: (duplicate layer id "?(.*)"?, previously used)"#)
        .expect("duplicate id regex")
});

static SOURCE_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^layers\[(\d+)\]: (source "(?:.*)" not found)"#).expect("source regex")
});

static LAYER_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^layers\[(\d+)\]\.(?:(\S+)\.)?(\S+): (.*)").expect("layer property regex")
});

/// A validation problem located on one layer field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerError {
    pub layer_index: usize,
    /// `id`, `source`, a bare property, or `group.property`.
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<LayerError>,
}

impl ValidationError {
    /// Classify a raw validator message.
    #[must_use]
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let parsed = classify_message(&message);
        Self { message, parsed }
    }

    #[must_use]
    pub fn layer_index(&self) -> Option<usize> {
        self.parsed.as_ref().map(|p| p.layer_index)
    }
}

fn classify_message(message: &str) -> Option<LayerError> {
    let layer_error = |index: &str, key: String, reason: &str| {
        index.parse().ok().map(|layer_index| LayerError {
            layer_index,
            key,
            message: reason.to_string(),
        })
    };

    if let Some(caps) = DUPLICATE_ID.captures(message) {
        return layer_error(&caps[1], "id".to_string(), &caps[2]);
    }
    if let Some(caps) = SOURCE_NOT_FOUND.captures(message) {
        return layer_error(&caps[1], "source".to_string(), &caps[2]);
    }
    let caps = LAYER_PROPERTY.captures(message)?;
    let key = match caps.get(2) {
        Some(group) => format!("{}.{}", group.as_str(), &caps[3]),
        None => caps[3].to_string(),
    };
    layer_error(&caps[1], key, &caps[4])
}

/// Errors for the second and later layers with an empty id.
///
/// Validators treat an empty id as absent and never flag duplicates of it.
#[must_use]
pub fn duplicate_empty_ids<'a>(
    layers: impl IntoIterator<Item = &'a Layer>,
) -> Vec<ValidationError> {
    empty_id_duplicates(
        layers
            .into_iter()
            .map(|layer| layer.id.as_deref() == Some("")),
    )
}

/// Same as [`duplicate_empty_ids`] over raw JSON layers.
#[must_use]
pub fn duplicate_empty_ids_in_value(style: &serde_json::Value) -> Vec<ValidationError> {
    let layers = style
        .get("layers")
        .and_then(serde_json::Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    empty_id_duplicates(
        layers
            .iter()
            .map(|layer| layer.get("id").and_then(serde_json::Value::as_str) == Some("")),
    )
}

fn empty_id_duplicates(is_empty: impl Iterator<Item = bool>) -> Vec<ValidationError> {
    is_empty
        .enumerate()
        .filter(|(_, empty)| *empty)
        .skip(1)
        .map(|(index, _)| {
            ValidationError::classify(format!(
                "layers[{index}]: duplicate layer id [empty_string], previously used"
            ))
        })
        .collect()
}
