//! Floor filter for indoor styles.
//!
//! Restricts every filterable layer to features of one `floor`. The active
//! floor is remembered in the editor metadata so the wrapping can be undone
//! exactly, leaving the author's own filters untouched.

use serde_json::{Value, json};
use tracing::debug;

use crate::document::{Layer, StyleDocument};
use crate::metadata::EditorKey;

const FLOOR_PROPERTY: &str = "floor";

/// Layer types that draw no features and take no filter.
const UNFILTERED_TYPES: [&str; 3] = ["background", "raster", "hillshade"];

fn is_filterable(layer: &Layer) -> bool {
    layer.source.is_some() && !UNFILTERED_TYPES.contains(&layer.layer_type())
}

fn floor_clause(floor: i64) -> Value {
    json!(["==", FLOOR_PROPERTY, floor])
}

/// The active floor, if a floor filter is applied.
#[must_use]
pub fn active_floor(style: &StyleDocument) -> Option<i64> {
    style
        .metadata
        .editor(EditorKey::FloorFilter)
        .and_then(Value::as_i64)
}

/// Restrict every filterable layer to `floor`, replacing any floor filter
/// already applied.
#[must_use]
pub fn apply_floor_filter(style: &StyleDocument, floor: i64) -> StyleDocument {
    let mut out = remove_floor_filter(style);
    let clause = floor_clause(floor);
    for layer in out.layers.iter_mut().filter(|layer| is_filterable(layer)) {
        layer.filter = Some(match layer.filter.take() {
            Some(filter) => json!(["all", filter, clause.clone()]),
            None => clause.clone(),
        });
    }
    out.metadata.set_editor(EditorKey::FloorFilter, json!(floor));
    debug!(floor, "applied floor filter");
    out
}

/// Undo [`apply_floor_filter`]. Documents without a floor filter are returned unchanged.
#[must_use]
pub fn remove_floor_filter(style: &StyleDocument) -> StyleDocument {
    let mut out = style.clone();
    let Some(floor) = active_floor(style) else {
        return out;
    };
    let clause = floor_clause(floor);
    for layer in out.layers.iter_mut().filter(|layer| is_filterable(layer)) {
        layer.filter = match layer.filter.take() {
            Some(filter) if filter == clause => None,
            Some(Value::Array(items))
                if items.len() == 3 && items[0] == "all" && items[2] == clause =>
            {
                items.into_iter().nth(1)
            }
            other => other,
        };
    }
    out.metadata.remove_editor(EditorKey::FloorFilter);
    out
}
