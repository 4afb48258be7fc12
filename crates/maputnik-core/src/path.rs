//! Property paths inside a style document.
//!
//! Validator messages address the offending value with a path such as
//! `layers[3].paint.fill-color` or `sources.osm.url`. [`JsonPath`] parses
//! that notation and can read or remove the addressed value from a
//! [`serde_json::Value`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde_json::Value;

use crate::error::StyleError;

/// Reduces a deep path to the first property after an array index:
/// `layers[0].filter[1][1][0]` becomes `layers[0].filter`.
static REPAIR_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+?\[\d+\]\.[^\[]+").expect("repair path regex"));

/// Reduce the path prefix of a validator message to the property that should
/// be removed during repair. Returns `None` when the message does not address
/// a property below an indexed element.
#[must_use]
pub fn reduce_error_path(message: &str) -> Option<&str> {
    let prefix = message.split(':').next().unwrap_or(message);
    REPAIR_PATH.find(prefix).map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed `a.b[0].c` style path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Read the addressed value.
    #[must_use]
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| match segment {
                PathSegment::Key(key) => node.as_object()?.get(key),
                PathSegment::Index(index) => node.as_array()?.get(*index),
            })
    }

    /// Remove the addressed value, returning it. Missing paths are a no-op.
    pub fn remove(&self, root: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut node = root;
        for segment in parents {
            node = match segment {
                PathSegment::Key(key) => node.as_object_mut()?.get_mut(key)?,
                PathSegment::Index(index) => node.as_array_mut()?.get_mut(*index)?,
            };
        }
        match last {
            PathSegment::Key(key) => node.as_object_mut()?.remove(key),
            PathSegment::Index(index) => {
                let array = node.as_array_mut()?;
                (*index < array.len()).then(|| array.remove(*index))
            }
        }
    }
}

impl FromStr for JsonPath {
    type Err = StyleError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let malformed = || StyleError::malformed_path(path);
        let mut segments = Vec::new();
        let mut rest = path;

        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']').ok_or_else(malformed)?;
                let index = after[..close].parse::<usize>().map_err(|_| malformed())?;
                segments.push(PathSegment::Index(index));
                rest = &after[close + 1..];
            } else {
                let rest_key = if segments.is_empty() {
                    rest
                } else {
                    rest.strip_prefix('.').ok_or_else(malformed)?
                };
                let end = rest_key.find(['.', '[']).unwrap_or(rest_key.len());
                if end == 0 {
                    return Err(malformed());
                }
                segments.push(PathSegment::Key(rest_key[..end].to_string()));
                rest = &rest_key[end..];
            }
        }

        if segments.is_empty() {
            return Err(malformed());
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reduce_stops_at_first_property_after_index() {
        assert_eq!(
            reduce_error_path("layers[0].filter[1][1][0]: expected"),
            Some("layers[0].filter")
        );
        assert_eq!(
            reduce_error_path("layers[12].paint.fill-color: color expected, number found"),
            Some("layers[12].paint.fill-color")
        );
        assert_eq!(
            reduce_error_path("layers[2].layout.text-font[0]: string expected"),
            Some("layers[2].layout.text-font")
        );
    }

    #[test]
    fn reduce_rejects_layer_level_and_root_messages() {
        assert_eq!(reduce_error_path("layers[1]: duplicate layer id \"a\", previously used"), None);
        assert_eq!(reduce_error_path("version: expected one of [8], 7 found"), None);
        assert_eq!(reduce_error_path("sources.osm.type: bad"), None);
    }

    #[test]
    fn parse_and_display_round_trip() {
        for text in ["layers[0].paint.fill-color", "sources.osm.url", "a[1][2].b", "glyphs"] {
            let path: JsonPath = text.parse().unwrap();
            assert_eq!(path.to_string(), text);
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        for text in ["", "a..b", "a[x]", "a[1", ".a", "a["] {
            assert!(text.parse::<JsonPath>().is_err(), "{text} should be rejected");
        }
    }

    #[test]
    fn remove_deletes_object_key() {
        let mut value = json!({"layers": [{"paint": {"fill-color": 5, "fill-opacity": 1}}]});
        let path: JsonPath = "layers[0].paint.fill-color".parse().unwrap();
        assert_eq!(path.remove(&mut value), Some(json!(5)));
        assert_eq!(value, json!({"layers": [{"paint": {"fill-opacity": 1}}]}));
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let mut value = json!({"layers": [{"id": "a"}]});
        let before = value.clone();
        let path: JsonPath = "layers[3].paint.fill-color".parse().unwrap();
        assert_eq!(path.remove(&mut value), None);
        assert_eq!(value, before);
    }

    #[test]
    fn get_reads_nested_values() {
        let value = json!({"a": [{"b": true}]});
        let path: JsonPath = "a[0].b".parse().unwrap();
        assert_eq!(path.get(&value), Some(&json!(true)));
    }
}
