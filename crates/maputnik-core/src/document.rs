//! Style document model.
//!
//! [`StyleDocument`] is a value type: every edit builds a new document. The
//! layer list and the source map use persistent collections from [`im`], so
//! cloning a document (for history snapshots or for a candidate edit) shares
//! all unchanged structure with the original instead of deep-copying it.
//!
//! Fields the editor never interprets, and fields whose value has the wrong
//! type, are kept in `extra` maps so that loading and saving a style never
//! drops or rewrites data. Type errors are left for the validator to report.

use std::fmt;

use im::{OrdMap, Vector};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::lenient::{ObjectWriter, take};
use crate::metadata::StyleMetadata;

/// The only style specification version the editor understands.
pub const STYLE_VERSION: u32 = 8;

/// Length of generated style ids.
const ID_LEN: usize = 9;

/// Layer keys copied from a referenced layer when resolving deprecated `ref`
/// layers, in addition to the typed fields.
const REF_PROPERTIES: [&str; 7] = [
    "type",
    "source",
    "source-layer",
    "minzoom",
    "maxzoom",
    "filter",
    "layout",
];

/// A map style document.
///
/// Fields holding a value of the wrong type are kept raw in `extra`.
/// `sources` and `layers` are always written.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDocument {
    pub version: Option<u32>,
    /// Empty when the document has no usable id yet.
    pub id: String,
    pub name: Option<String>,
    pub metadata: StyleMetadata,
    pub sources: OrdMap<String, SourceDescriptor>,
    pub sprite: Option<Sprite>,
    pub glyphs: Option<String>,
    pub light: Option<Map<String, Value>>,
    pub terrain: Option<Map<String, Value>>,
    pub transition: Option<Map<String, Value>>,
    pub layers: Vector<Layer>,
    pub extra: Map<String, Value>,
}

impl StyleDocument {
    fn from_map(mut map: Map<String, Value>) -> Self {
        Self {
            version: take(&mut map, "version"),
            id: take(&mut map, "id").unwrap_or_default(),
            name: take(&mut map, "name"),
            metadata: take(&mut map, "metadata").unwrap_or_default(),
            sources: take(&mut map, "sources").unwrap_or_default(),
            sprite: take(&mut map, "sprite"),
            glyphs: take(&mut map, "glyphs"),
            light: take(&mut map, "light"),
            terrain: take(&mut map, "terrain"),
            transition: take(&mut map, "transition"),
            layers: take(&mut map, "layers").unwrap_or_default(),
            extra: map,
        }
    }
}

impl Serialize for StyleDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut out = ObjectWriter::new(serializer.serialize_map(None)?, &self.extra);
        out.field("version", self.version.as_ref())?;
        out.field("id", Some(&self.id).filter(|id| !id.is_empty()))?;
        out.field("name", self.name.as_ref())?;
        out.field("metadata", Some(&self.metadata).filter(|m| !m.is_empty()))?;
        out.defaulted("sources", &self.sources)?;
        out.field("sprite", self.sprite.as_ref())?;
        out.field("glyphs", self.glyphs.as_ref())?;
        out.field("light", self.light.as_ref())?;
        out.field("terrain", self.terrain.as_ref())?;
        out.field("transition", self.transition.as_ref())?;
        out.defaulted("layers", &self.layers)?;
        out.finish()
    }
}

impl<'de> Deserialize<'de> for StyleDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Map::<String, Value>::deserialize(deserializer).map(Self::from_map)
    }
}

impl StyleDocument {
    /// Serialise into a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialise from a JSON value without normalising.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    #[must_use]
    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    #[must_use]
    pub fn layer_index(&self, id: &str) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id() == id)
    }

    #[must_use]
    pub fn source(&self, id: &str) -> Option<&SourceDescriptor> {
        self.sources.get(id)
    }

    /// Sprite URLs in declaration order.
    #[must_use]
    pub fn sprite_urls(&self) -> Vec<&str> {
        match &self.sprite {
            None => Vec::new(),
            Some(Sprite::Url(url)) => vec![url.as_str()],
            Some(Sprite::Sheets(sheets)) => sheets.iter().map(|s| s.url.as_str()).collect(),
        }
    }
}

/// One drawing rule of a style.
///
/// `id` and `layer_type` are `None` when the key is missing or not a string;
/// the validator reports either case.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub id: Option<String>,
    pub layer_type: Option<String>,
    pub source: Option<String>,
    pub source_layer: Option<String>,
    pub filter: Option<Value>,
    pub layout: Option<Map<String, Value>>,
    pub paint: Option<Map<String, Value>>,
    pub metadata: Option<Value>,
    pub extra: Map<String, Value>,
}

impl Serialize for Layer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut out = ObjectWriter::new(serializer.serialize_map(None)?, &self.extra);
        out.field("id", self.id.as_ref())?;
        out.field("type", self.layer_type.as_ref())?;
        out.field("source", self.source.as_ref())?;
        out.field("source-layer", self.source_layer.as_ref())?;
        out.field("filter", self.filter.as_ref())?;
        out.field("layout", self.layout.as_ref())?;
        out.field("paint", self.paint.as_ref())?;
        out.field("metadata", self.metadata.as_ref())?;
        out.finish()
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            id: take(&mut map, "id"),
            layer_type: take(&mut map, "type"),
            source: take(&mut map, "source"),
            source_layer: take(&mut map, "source-layer"),
            filter: take(&mut map, "filter"),
            layout: take(&mut map, "layout"),
            paint: take(&mut map, "paint"),
            metadata: take(&mut map, "metadata"),
            extra: map,
        })
    }
}

impl Layer {
    #[must_use]
    pub fn new(id: impl Into<String>, layer_type: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            layer_type: Some(layer_type.into()),
            source: None,
            source_layer: None,
            filter: None,
            layout: None,
            paint: None,
            metadata: None,
            extra: Map::new(),
        }
    }

    /// The layer id, or `""` when it has none.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn layer_type(&self) -> &str {
        self.layer_type.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_source_layer(mut self, source_layer: impl Into<String>) -> Self {
        self.source_layer = Some(source_layer.into());
        self
    }

    #[must_use]
    pub fn with_paint(mut self, key: impl Into<String>, value: Value) -> Self {
        self.paint
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_layout(mut self, key: impl Into<String>, value: Value) -> Self {
        self.layout
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn paint_value(&self, key: &str) -> Option<&Value> {
        self.paint.as_ref().and_then(|paint| paint.get(key))
    }

    #[must_use]
    pub fn layout_value(&self, key: &str) -> Option<&Value> {
        self.layout.as_ref().and_then(|layout| layout.get(key))
    }
}

/// Data source kinds defined by the style specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Vector,
    Raster,
    RasterDem,
    GeoJson,
    Image,
    Video,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Vector,
        SourceKind::Raster,
        SourceKind::RasterDem,
        SourceKind::GeoJson,
        SourceKind::Image,
        SourceKind::Video,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Raster => "raster",
            Self::RasterDem => "raster-dem",
            Self::GeoJson => "geojson",
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Whether layers drawing from this source need a `source-layer`.
    #[must_use]
    pub const fn is_tiled_vector(self) -> bool {
        matches!(self, Self::Vector)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared data source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub source_type: Option<String>,
    pub url: Option<String>,
    pub tiles: Option<Vec<String>>,
    pub data: Option<Value>,
    pub extra: Map<String, Value>,
}

impl Serialize for SourceDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut out = ObjectWriter::new(serializer.serialize_map(None)?, &self.extra);
        out.field("type", self.source_type.as_ref())?;
        out.field("url", self.url.as_ref())?;
        out.field("tiles", self.tiles.as_ref())?;
        out.field("data", self.data.as_ref())?;
        out.finish()
    }
}

impl<'de> Deserialize<'de> for SourceDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            source_type: take(&mut map, "type"),
            url: take(&mut map, "url"),
            tiles: take(&mut map, "tiles"),
            data: take(&mut map, "data"),
            extra: map,
        })
    }
}

impl SourceDescriptor {
    #[must_use]
    pub fn new(kind: SourceKind) -> Self {
        Self {
            source_type: Some(kind.as_str().to_string()),
            url: None,
            tiles: None,
            data: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn vector_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::new(SourceKind::Vector)
        }
    }

    #[must_use]
    pub fn geojson(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(SourceKind::GeoJson)
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<SourceKind> {
        self.source_type.as_deref().and_then(SourceKind::parse)
    }

    /// Vector sources with a TileJSON URL are the only ones with fetchable layer lists.
    #[must_use]
    pub fn is_vector_with_url(&self) -> bool {
        self.kind() == Some(SourceKind::Vector) && self.url.is_some()
    }
}

/// The `sprite` property: one URL or a list of named sheets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sprite {
    Url(String),
    Sheets(Vec<SpriteSheet>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSheet {
    pub id: String,
    pub url: String,
}

/// Generate a short random style id.
#[must_use]
pub fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .filter_map(|_| std::char::from_digit(rng.random_range(0..36), 36))
        .collect()
}

/// The document a fresh session starts with.
#[must_use]
pub fn empty_style() -> StyleDocument {
    StyleDocument {
        version: Some(STYLE_VERSION),
        id: generate_id(),
        name: Some("Empty Style".to_string()),
        metadata: StyleMetadata::new(),
        sources: OrdMap::new(),
        sprite: None,
        glyphs: None,
        light: None,
        terrain: None,
        transition: None,
        layers: Vector::new(),
        extra: Map::new(),
    }
}

/// Parse a style from JSON text and normalise it.
pub fn parse_style(json: &str) -> Result<StyleDocument> {
    let style: StyleDocument = serde_json::from_str(json)?;
    Ok(ensure_style_validity(style))
}

/// Normalise a freshly loaded style.
///
/// Assigns an id when missing, drops the obsolete layer `interactive` flag,
/// and inlines deprecated `ref` layers.
#[must_use]
pub fn ensure_style_validity(mut style: StyleDocument) -> StyleDocument {
    if style.id.is_empty() {
        style.id = generate_id();
        style.extra.remove("id");
        debug!(id = %style.id, "generated style id");
    }

    let originals = style.layers.clone();
    for layer in style.layers.iter_mut() {
        layer.extra.remove("interactive");

        let Some(Value::String(ref_id)) = layer.extra.remove("ref") else {
            continue;
        };
        let Some(parent) = originals.iter().find(|l| l.id() == ref_id) else {
            debug!(layer = layer.id(), parent = %ref_id, "dropping dangling ref");
            continue;
        };
        deref_layer(layer, parent);
    }
    style
}

fn deref_layer(layer: &mut Layer, parent: &Layer) {
    layer.layer_type = parent.layer_type.clone();
    layer.source = parent.source.clone();
    layer.source_layer = parent.source_layer.clone();
    layer.filter = parent.filter.clone();
    layer.layout = parent.layout.clone();
    for key in REF_PROPERTIES {
        match parent.extra.get(key) {
            Some(value) => {
                layer.extra.insert(key.to_string(), value.clone());
            }
            None => {
                layer.extra.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "version": 8,
            "id": "abc",
            "name": "Sample",
            "center": [0, 0],
            "sources": {
                "osm": {"type": "vector", "url": "https://example.com/tiles.json", "maxzoom": 14}
            },
            "sprite": "https://example.com/sprite",
            "glyphs": "https://example.com/{fontstack}/{range}.pbf",
            "layers": [
                {"id": "bg", "type": "background", "paint": {"background-color": "#fff"}},
                {
                    "id": "water", "type": "fill", "source": "osm", "source-layer": "water",
                    "minzoom": 2
                }
            ]
        })
    }

    #[test]
    fn round_trip_preserves_unknown_fields() {
        let value = sample();
        let style = StyleDocument::from_value(value.clone()).unwrap();
        assert_eq!(style.extra.get("center"), Some(&json!([0, 0])));
        assert_eq!(style.layers[1].extra.get("minzoom"), Some(&json!(2)));
        assert_eq!(style.to_value().unwrap(), value);
    }

    #[test]
    fn source_kind_parsing() {
        let style = StyleDocument::from_value(sample()).unwrap();
        let osm = style.source("osm").unwrap();
        assert_eq!(osm.kind(), Some(SourceKind::Vector));
        assert!(osm.is_vector_with_url());
        assert_eq!(osm.extra.get("maxzoom"), Some(&json!(14)));
    }

    #[test]
    fn sprite_accepts_sheet_lists() {
        let style: StyleDocument = serde_json::from_value(json!({
            "version": 8,
            "sources": {},
            "layers": [],
            "sprite": [
                {"id": "default", "url": "https://a/sprite"},
                {"id": "x", "url": "https://b/s"}
            ]
        }))
        .unwrap();
        assert_eq!(style.sprite_urls(), vec!["https://a/sprite", "https://b/s"]);
    }

    #[test]
    fn generated_ids_are_base36() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn empty_style_has_no_layers_or_sources() {
        let style = empty_style();
        assert_eq!(style.version, Some(STYLE_VERSION));
        assert!(style.layers.is_empty());
        assert!(style.sources.is_empty());
        assert!(!style.id.is_empty());
    }

    #[test]
    fn ensure_validity_assigns_missing_id() {
        let style = parse_style(r#"{"version": 8, "sources": {}, "layers": []}"#).unwrap();
        assert_eq!(style.id.len(), ID_LEN);
    }

    #[test]
    fn ensure_validity_drops_interactive_and_derefs() {
        let style = parse_style(
            &json!({
                "version": 8,
                "id": "s",
                "sources": {"osm": {"type": "vector", "url": "x"}},
                "layers": [
                    {"id": "road", "type": "line", "source": "osm", "source-layer": "roads",
                     "filter": ["==", "class", "primary"], "interactive": true, "maxzoom": 12},
                    {"id": "road-casing", "ref": "road", "paint": {"line-width": 4}}
                ]
            })
            .to_string(),
        )
        .unwrap();

        let casing = &style.layers[1];
        assert_eq!(casing.layer_type(), "line");
        assert_eq!(casing.source.as_deref(), Some("osm"));
        assert_eq!(casing.source_layer.as_deref(), Some("roads"));
        assert_eq!(casing.filter, Some(json!(["==", "class", "primary"])));
        assert_eq!(casing.extra.get("maxzoom"), Some(&json!(12)));
        assert!(!casing.extra.contains_key("ref"));
        assert!(!style.layers[0].extra.contains_key("interactive"));
        assert_eq!(casing.paint_value("line-width"), Some(&json!(4)));
    }

    #[test]
    fn wrong_types_stay_raw_for_the_validator() {
        let value = json!({
            "version": "8",
            "id": "s",
            "glyphs": 5,
            "sources": {"a": {"type": "vector", "url": 5, "tiles": ["x", 1]}},
            "layers": [{"id": 7, "type": "background", "paint": []}]
        });
        let style = StyleDocument::from_value(value.clone()).unwrap();
        assert_eq!(style.version, None);
        assert_eq!(style.glyphs, None);
        assert_eq!(style.extra.get("glyphs"), Some(&json!(5)));
        assert_eq!(style.sources["a"].url, None);
        assert_eq!(style.sources["a"].extra.get("tiles"), Some(&json!(["x", 1])));
        assert_eq!(style.layers[0].id, None);
        assert_eq!(style.layers[0].id(), "");
        assert_eq!(style.layers[0].layer_type(), "background");
        assert_eq!(style.to_value().unwrap(), value);
    }

    #[test]
    fn missing_layer_ids_are_not_invented() {
        let value = json!({
            "version": 8,
            "id": "s",
            "sources": {"a": {"url": "https://x/t.json"}},
            "layers": [{"type": "background"}, {"id": "", "type": "background"}]
        });
        let style = StyleDocument::from_value(value.clone()).unwrap();
        assert_eq!(style.layers[0].id, None);
        assert_eq!(style.layers[1].id.as_deref(), Some(""));
        assert_eq!(style.sources["a"].source_type, None);
        assert_eq!(style.to_value().unwrap(), value);
    }

    #[test]
    fn generated_id_replaces_ill_typed_one() {
        let style =
            parse_style(r#"{"version": 8, "id": 12, "sources": {}, "layers": []}"#).unwrap();
        assert_eq!(style.id.len(), ID_LEN);
        assert_eq!(style.to_value().unwrap()["id"], json!(style.id));
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(StyleDocument::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn layer_builders_populate_groups() {
        let layer = Layer::new("l", "line")
            .with_source("osm")
            .with_paint("line-color", json!("red"))
            .with_layout("line-cap", json!("round"));
        assert_eq!(layer.paint_value("line-color"), Some(&json!("red")));
        assert_eq!(layer.layout_value("line-cap"), Some(&json!("round")));
    }
}
