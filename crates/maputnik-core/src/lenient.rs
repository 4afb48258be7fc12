//! Loose (de)serialisation for the document model.
//!
//! A candidate document may hold values of the wrong type anywhere; those
//! are validation errors, not parse errors. Typed fields are therefore read
//! out of the raw JSON object only when they have the expected shape. Anything
//! else stays in the owner's `extra` map under its original key, so the
//! validator still sees it and saving writes it back unchanged.
//!
//! Reading never leaves a key both in a typed field and in `extra`. When
//! later edits set a typed field anyway, the typed value is written.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde_json::{Map, Value};
use tracing::trace;

/// Move `key` out of `map` if it deserializes as `T`.
pub(crate) fn take<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = map.get(key)?;
    match T::deserialize(value) {
        Ok(typed) => {
            map.remove(key);
            Some(typed)
        }
        Err(err) => {
            trace!(key, error = %err, "keeping ill-typed field raw");
            None
        }
    }
}

/// Writes typed fields followed by the raw `extra` entries of one object.
pub(crate) struct ObjectWriter<'a, M> {
    map: M,
    extra: &'a Map<String, Value>,
    written: Vec<&'static str>,
}

impl<'a, M: SerializeMap> ObjectWriter<'a, M> {
    pub(crate) fn new(map: M, extra: &'a Map<String, Value>) -> Self {
        Self {
            map,
            extra,
            written: Vec::new(),
        }
    }

    /// Write `value` under `key` when present.
    pub(crate) fn field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: Option<&T>,
    ) -> Result<(), M::Error> {
        let Some(value) = value else {
            return Ok(());
        };
        self.written.push(key);
        self.map.serialize_entry(key, value)
    }

    /// Write a field that defaults to empty, unless a raw value replaces it.
    pub(crate) fn defaulted<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), M::Error> {
        if self.extra.contains_key(key) {
            return Ok(());
        }
        self.field(key, Some(value))
    }

    pub(crate) fn finish(mut self) -> Result<M::Ok, M::Error> {
        for (key, value) in self.extra {
            if !self.written.contains(&key.as_str()) {
                self.map.serialize_entry(key, value)?;
            }
        }
        self.map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn take_keeps_wrong_types_in_place() {
        let mut map = json!({"glyphs": 5, "name": "n"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(take::<String>(&mut map, "glyphs"), None);
        assert_eq!(take::<String>(&mut map, "name").as_deref(), Some("n"));
        assert_eq!(take::<String>(&mut map, "missing"), None);
        assert_eq!(Value::Object(map), json!({"glyphs": 5}));
    }

    struct Pair {
        name: Option<String>,
        items: Vec<u8>,
        extra: Map<String, Value>,
    }

    impl Serialize for Pair {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut out = ObjectWriter::new(serializer.serialize_map(None)?, &self.extra);
            out.field("name", self.name.as_ref())?;
            out.defaulted("items", &self.items)?;
            out.finish()
        }
    }

    #[test]
    fn typed_fields_win_and_raw_collections_survive() {
        let extra = json!({"name": 1, "items": "oops", "other": true});
        let pair = Pair {
            name: Some("set later".into()),
            items: Vec::new(),
            extra: extra.as_object().cloned().unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&pair).unwrap(),
            json!({"name": "set later", "items": "oops", "other": true})
        );
    }
}
