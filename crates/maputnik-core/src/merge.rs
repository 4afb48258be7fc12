//! JSON merge-patch (RFC 7396).
//!
//! Partial edits are expressed as patches: objects merge recursively, `null`
//! removes a key, and every other value replaces what was there.

use serde_json::Value;

use crate::document::StyleDocument;
use crate::error::{Result, StyleError};

/// Apply `patch` to `target` in place.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    let Value::Object(target) = target else {
        return;
    };
    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
        } else {
            merge_patch(target.entry(key.as_str()).or_insert(Value::Null), value);
        }
    }
}

impl StyleDocument {
    /// A new document with `patch` merged in.
    pub fn merged(&self, patch: &Value) -> Result<StyleDocument> {
        if !patch.is_object() {
            return Err(StyleError::NotAnObject);
        }
        let mut value = self.to_value()?;
        merge_patch(&mut value, patch);
        StyleDocument::from_value(value)
    }
}
