//! Style validation.
//!
//! The editor treats validation as a black box behind [`StyleValidator`]:
//! a validator receives the document as JSON and returns free-text messages
//! of the form `path: reason`. The repair pipeline only relies on that shape.
//!
//! [`SpecValidator`] is the built-in implementation. It covers the parts of
//! the version 8 style specification the editor depends on and words its
//! messages the way MapLibre's reference validator does.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::document::{STYLE_VERSION, SourceKind};
use crate::spec_table::{
    self, LayerTypeSpec, PropertySpec, ValueKind, ZOOM_MAX, ZOOM_MIN, is_expression_operator,
};

/// A style validator.
pub trait StyleValidator: Send + Sync {
    /// Validate a style document, returning one message per problem.
    fn validate(&self, style: &Value) -> Vec<String>;
}

impl<F> StyleValidator for F
where
    F: Fn(&Value) -> Vec<String> + Send + Sync,
{
    fn validate(&self, style: &Value) -> Vec<String> {
        self(style)
    }
}

/// Built-in validator for style version 8.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecValidator;

impl SpecValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StyleValidator for SpecValidator {
    fn validate(&self, style: &Value) -> Vec<String> {
        let mut errors = Errors::default();
        let Some(root) = style.as_object() else {
            errors.push("", format!("object expected, {} found", type_name(style)));
            return errors.0;
        };

        check_version(root, &mut errors);
        check_glyphs(root, &mut errors);
        let sources = check_sources(root, &mut errors);
        check_layers(root, &sources, &mut errors);
        check_transition(root, &mut errors);
        errors.0
    }
}

#[derive(Default)]
struct Errors(Vec<String>);

impl Errors {
    fn push(&mut self, key: &str, message: impl AsRef<str>) {
        if key.is_empty() {
            self.0.push(message.as_ref().to_string());
        } else {
            self.0.push(format!("{key}: {}", message.as_ref()));
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_version(root: &Map<String, Value>, errors: &mut Errors) {
    match root.get("version") {
        None => errors.push("", "missing required property \"version\""),
        Some(Value::Number(n)) if n.as_u64() == Some(u64::from(STYLE_VERSION)) => {}
        Some(other) => errors.push(
            "version",
            format!("expected one of [{STYLE_VERSION}], {other} found"),
        ),
    }
}

fn check_glyphs(root: &Map<String, Value>, errors: &mut Errors) {
    let Some(glyphs) = root.get("glyphs") else {
        return;
    };
    let Some(template) = glyphs.as_str() else {
        errors.push(
            "glyphs",
            format!("string expected, {} found", type_name(glyphs)),
        );
        return;
    };
    for token in ["{fontstack}", "{range}"] {
        if !template.contains(token) {
            errors.push("glyphs", format!("\"{token}\" token required"));
        }
    }
}

/// Validates the source map, returning each declared source id with its type.
fn check_sources(root: &Map<String, Value>, errors: &mut Errors) -> Vec<(String, Option<String>)> {
    let Some(sources) = root.get("sources") else {
        errors.push("", "missing required property \"sources\"");
        return Vec::new();
    };
    let Some(sources) = sources.as_object() else {
        errors.push(
            "sources",
            format!("object expected, {} found", type_name(sources)),
        );
        return Vec::new();
    };

    let mut declared = Vec::with_capacity(sources.len());
    for (id, source) in sources {
        let key = format!("sources.{id}");
        let Some(source) = source.as_object() else {
            errors.push(&key, format!("object expected, {} found", type_name(source)));
            declared.push((id.clone(), None));
            continue;
        };
        let source_type = match source.get("type") {
            None => {
                errors.push(&key, "\"type\" is required");
                None
            }
            Some(Value::String(kind)) => match SourceKind::parse(kind) {
                Some(kind) => Some(kind),
                None => {
                    errors.push(
                        &format!("{key}.type"),
                        format!(
                            "expected one of [{}], \"{kind}\" found",
                            SourceKind::ALL.map(|k| format!("\"{k}\"")).join(", ")
                        ),
                    );
                    None
                }
            },
            Some(other) => {
                errors.push(
                    &format!("{key}.type"),
                    format!("string expected, {} found", type_name(other)),
                );
                None
            }
        };

        if let Some(kind) = source_type {
            check_source_fields(&key, kind, source, errors);
        }
        declared.push((id.clone(), source_type.map(|k| k.as_str().to_string())));
    }
    declared
}

fn check_source_fields(
    key: &str,
    kind: SourceKind,
    source: &Map<String, Value>,
    errors: &mut Errors,
) {
    let required: &[&str] = match kind {
        SourceKind::Vector | SourceKind::Raster | SourceKind::RasterDem => &[],
        SourceKind::GeoJson => &["data"],
        SourceKind::Image => &["url", "coordinates"],
        SourceKind::Video => &["urls", "coordinates"],
    };
    for field in required {
        if !source.contains_key(*field) {
            errors.push(key, format!("missing required property \"{field}\""));
        }
    }
    if let Some(url) = source.get("url")
        && !url.is_string()
    {
        errors.push(
            &format!("{key}.url"),
            format!("string expected, {} found", type_name(url)),
        );
    }
    if let Some(tiles) = source.get("tiles") {
        check_string_array(&format!("{key}.tiles"), tiles, errors);
    }
    for zoom in ["minzoom", "maxzoom"] {
        if let Some(value) = source.get(zoom) {
            check_number(&format!("{key}.{zoom}"), value, Some(ZOOM_MIN), Some(ZOOM_MAX), errors);
        }
    }
}

fn check_layers(
    root: &Map<String, Value>,
    sources: &[(String, Option<String>)],
    errors: &mut Errors,
) {
    let Some(layers) = root.get("layers") else {
        errors.push("", "missing required property \"layers\"");
        return;
    };
    let Some(layers) = layers.as_array() else {
        errors.push(
            "layers",
            format!("array expected, {} found", type_name(layers)),
        );
        return;
    };

    let has_glyphs = root.contains_key("glyphs");
    let mut seen_ids = HashSet::new();
    for (index, layer) in layers.iter().enumerate() {
        let key = format!("layers[{index}]");
        let Some(layer) = layer.as_object() else {
            errors.push(&key, format!("object expected, {} found", type_name(layer)));
            continue;
        };
        check_layer(&key, layer, sources, has_glyphs, &mut seen_ids, errors);
    }
}

fn check_layer(
    key: &str,
    layer: &Map<String, Value>,
    sources: &[(String, Option<String>)],
    has_glyphs: bool,
    seen_ids: &mut HashSet<String>,
    errors: &mut Errors,
) {
    match layer.get("id") {
        None => errors.push(key, "missing required property \"id\""),
        Some(Value::String(id)) => {
            // Empty ids are not tracked here; the repair pipeline reports them.
            if !id.is_empty() && !seen_ids.insert(id.clone()) {
                errors.push(key, format!("duplicate layer id \"{id}\", previously used"));
            }
        }
        Some(other) => errors.push(
            &format!("{key}.id"),
            format!("string expected, {} found", type_name(other)),
        ),
    }

    let layer_spec = match layer.get("type") {
        None => {
            errors.push(key, "missing required property \"type\"");
            None
        }
        Some(Value::String(name)) => {
            let spec = spec_table::layer_type(name);
            if spec.is_none() {
                errors.push(
                    &format!("{key}.type"),
                    format!(
                        "expected one of [{}], \"{name}\" found",
                        spec_table::layer_type_names()
                            .iter()
                            .map(|n| format!("\"{n}\""))
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                );
            }
            spec
        }
        Some(other) => {
            errors.push(
                &format!("{key}.type"),
                format!("string expected, {} found", type_name(other)),
            );
            None
        }
    };

    if let Some(spec) = layer_spec {
        check_layer_source(key, layer, spec, sources, errors);
    }

    for zoom in ["minzoom", "maxzoom"] {
        if let Some(value) = layer.get(zoom) {
            check_number(&format!("{key}.{zoom}"), value, Some(ZOOM_MIN), Some(ZOOM_MAX), errors);
        }
    }

    if let Some(filter) = layer.get("filter")
        && !filter.is_array()
    {
        errors.push(
            &format!("{key}.filter"),
            format!("array expected, {} found", type_name(filter)),
        );
    }

    if let Some(source_layer) = layer.get("source-layer")
        && !source_layer.is_string()
    {
        errors.push(
            &format!("{key}.source-layer"),
            format!("string expected, {} found", type_name(source_layer)),
        );
    }

    for group in ["paint", "layout"] {
        let Some(properties) = layer.get(group) else {
            continue;
        };
        let group_key = format!("{key}.{group}");
        let Some(properties) = properties.as_object() else {
            errors.push(
                &group_key,
                format!("object expected, {} found", type_name(properties)),
            );
            continue;
        };
        // Without a known type there is nothing to check the properties against.
        let Some(spec) = layer_spec else {
            continue;
        };
        for (name, value) in properties {
            check_property(&group_key, group, spec, name, value, has_glyphs, errors);
        }
    }
}

fn check_layer_source(
    key: &str,
    layer: &Map<String, Value>,
    spec: &LayerTypeSpec,
    sources: &[(String, Option<String>)],
    errors: &mut Errors,
) {
    if !spec.needs_source() {
        return;
    }
    let source_id = match layer.get("source") {
        None => {
            errors.push(key, "missing required property \"source\"");
            return;
        }
        Some(Value::String(id)) => id,
        Some(other) => {
            errors.push(
                &format!("{key}.source"),
                format!("string expected, {} found", type_name(other)),
            );
            return;
        }
    };

    let Some((_, source_type)) = sources.iter().find(|(id, _)| id == source_id) else {
        errors.push(key, format!("source \"{source_id}\" not found"));
        return;
    };
    let Some(source_type) = source_type else {
        return;
    };
    let layer_id = layer.get("id").and_then(Value::as_str).unwrap_or_default();

    if !spec.source_types.contains(&source_type.as_str()) {
        let wanted = match spec.source_types {
            ["raster"] => "raster",
            ["raster-dem"] => "raster-dem",
            _ => "vector",
        };
        errors.push(key, format!("layer \"{layer_id}\" requires a {wanted} source"));
        return;
    }
    if source_type == "vector" && !layer.contains_key("source-layer") {
        errors.push(
            key,
            format!("layer \"{layer_id}\" must specify a \"source-layer\""),
        );
    }
}

fn check_property(
    group_key: &str,
    group: &str,
    spec: &LayerTypeSpec,
    name: &str,
    value: &Value,
    has_glyphs: bool,
    errors: &mut Errors,
) {
    let key = format!("{group_key}.{name}");
    let lookup = |n: &str| -> Option<&'static PropertySpec> {
        if group == "paint" {
            spec.paint_property(n)
        } else {
            spec.layout_property(n)
        }
    };

    // Paint transitions: `<property>-transition` with an options object.
    if group == "paint"
        && let Some(base) = name.strip_suffix("-transition")
        && lookup(base).is_some()
    {
        if !value.is_object() {
            errors.push(&key, format!("object expected, {} found", type_name(value)));
        }
        return;
    }

    let Some(property) = lookup(name) else {
        errors.push(&key, format!("unknown property \"{name}\""));
        return;
    };

    if name == "text-field" && !has_glyphs {
        errors.push(
            &key,
            "use of \"text-field\" requires a style \"glyphs\" property",
        );
    }

    if is_expression(value) || is_function(value) {
        return;
    }
    check_value(&key, property.kind, value, errors);
}

fn is_expression(value: &Value) -> bool {
    value
        .as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_str)
        .is_some_and(is_expression_operator)
}

fn is_function(value: &Value) -> bool {
    value.as_object().is_some_and(|object| {
        object.contains_key("stops")
            || object.get("type").and_then(Value::as_str) == Some("identity")
    })
}

fn check_value(key: &str, kind: ValueKind, value: &Value, errors: &mut Errors) {
    match kind {
        ValueKind::Any => {}
        ValueKind::Color => check_color(key, value, errors),
        ValueKind::Number { min, max } => check_number(key, value, min, max, errors),
        ValueKind::Boolean => {
            if !value.is_boolean() {
                errors.push(key, format!("boolean expected, {} found", type_name(value)));
            }
        }
        ValueKind::String => {
            if !value.is_string() {
                errors.push(key, format!("string expected, {} found", type_name(value)));
            }
        }
        ValueKind::Enum(allowed) => check_enum(key, allowed, value, errors),
        ValueKind::NumberArray => {
            let Some(items) = value.as_array() else {
                errors.push(key, format!("array expected, {} found", type_name(value)));
                return;
            };
            for (i, item) in items.iter().enumerate() {
                check_number(&format!("{key}[{i}]"), item, None, None, errors);
            }
        }
        ValueKind::StringArray => check_string_array(key, value, errors),
    }
}

fn check_color(key: &str, value: &Value, errors: &mut Errors) {
    let Some(text) = value.as_str() else {
        errors.push(key, format!("color expected, {} found", type_name(value)));
        return;
    };
    if csscolorparser::parse(text).is_err() {
        errors.push(key, format!("color expected, \"{text}\" found"));
    }
}

fn check_number(key: &str, value: &Value, min: Option<f64>, max: Option<f64>, errors: &mut Errors) {
    let Some(number) = value.as_f64() else {
        errors.push(key, format!("number expected, {} found", type_name(value)));
        return;
    };
    if let Some(min) = min
        && number < min
    {
        errors.push(key, format!("{value} is less than the minimum value {min}"));
    }
    if let Some(max) = max
        && number > max
    {
        errors.push(key, format!("{value} is greater than the maximum value {max}"));
    }
}

fn check_enum(key: &str, allowed: &[&str], value: &Value, errors: &mut Errors) {
    if value.as_str().is_some_and(|v| allowed.contains(&v)) {
        return;
    }
    let listed = allowed
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ");
    errors.push(key, format!("expected one of [{listed}], {value} found"));
}

fn check_string_array(key: &str, value: &Value, errors: &mut Errors) {
    let Some(items) = value.as_array() else {
        errors.push(key, format!("array expected, {} found", type_name(value)));
        return;
    };
    for (i, item) in items.iter().enumerate() {
        if !item.is_string() {
            errors.push(
                &format!("{key}[{i}]"),
                format!("string expected, {} found", type_name(item)),
            );
        }
    }
}

fn check_transition(root: &Map<String, Value>, errors: &mut Errors) {
    let Some(transition) = root.get("transition") else {
        return;
    };
    let Some(transition) = transition.as_object() else {
        errors.push(
            "transition",
            format!("object expected, {} found", type_name(transition)),
        );
        return;
    };
    for field in ["duration", "delay"] {
        if let Some(value) = transition.get(field) {
            check_number(&format!("transition.{field}"), value, Some(0.0), None, errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn style(layers: Value) -> Value {
        json!({
            "version": 8,
            "sources": {
                "osm": {"type": "vector", "url": "https://example.com/tiles.json"},
                "sat": {"type": "raster", "tiles": ["https://example.com/{z}/{x}/{y}.png"]}
            },
            "layers": layers
        })
    }

    fn validate(value: &Value) -> Vec<String> {
        SpecValidator.validate(value)
    }

    #[test]
    fn valid_style_has_no_errors() {
        let value = style(json!([
            {"id": "bg", "type": "background", "paint": {"background-color": "#fafafa"}},
            {"id": "water", "type": "fill", "source": "osm", "source-layer": "water",
             "paint": {"fill-color": "rgba(0, 0, 255, 0.5)", "fill-opacity": 0.8,
                       "fill-color-transition": {"duration": 300}},
             "filter": ["==", "class", "lake"]},
            {"id": "road", "type": "line", "source": "osm", "source-layer": "roads",
             "layout": {"line-cap": "round", "visibility": "visible"},
             "paint": {"line-width": ["interpolate", ["linear"], ["zoom"], 5, 1, 12, 4],
                       "line-dasharray": [2, 1]}},
            {"id": "imagery", "type": "raster", "source": "sat", "maxzoom": 20}
        ]));
        assert_eq!(validate(&value), Vec::<String>::new());
    }

    #[test]
    fn wrong_version() {
        let mut value = style(json!([]));
        value["version"] = json!(7);
        assert_eq!(validate(&value), vec!["version: expected one of [8], 7 found"]);
    }

    #[test]
    fn color_type_mismatch() {
        let value = style(json!([
            {"id": "water", "type": "fill", "source": "osm", "source-layer": "water",
             "paint": {"fill-color": 5}}
        ]));
        assert_eq!(
            validate(&value),
            vec!["layers[0].paint.fill-color: color expected, number found"]
        );
    }

    #[test]
    fn unparseable_color_string() {
        let value = style(json!([
            {"id": "bg", "type": "background", "paint": {"background-color": "not-a-color"}}
        ]));
        assert_eq!(
            validate(&value),
            vec![r#"layers[0].paint.background-color: color expected, "not-a-color" found"#]
        );
    }

    #[test]
    fn duplicate_and_missing_source() {
        let value = style(json!([
            {"id": "a", "type": "fill", "source": "osm", "source-layer": "x"},
            {"id": "a", "type": "fill", "source": "nope", "source-layer": "x"}
        ]));
        assert_eq!(
            validate(&value),
            vec![
                r#"layers[1]: duplicate layer id "a", previously used"#,
                r#"layers[1]: source "nope" not found"#,
            ]
        );
    }

    #[test]
    fn empty_ids_are_left_to_the_pipeline() {
        let value = style(json!([
            {"id": "", "type": "background"},
            {"id": "", "type": "background"}
        ]));
        assert!(validate(&value).is_empty());
    }

    #[test]
    fn vector_layers_need_source_layer() {
        let value = style(json!([{"id": "w", "type": "fill", "source": "osm"}]));
        assert_eq!(
            validate(&value),
            vec![r#"layers[0]: layer "w" must specify a "source-layer""#]
        );
    }

    #[test]
    fn raster_layer_on_vector_source() {
        let value = style(json!([{"id": "r", "type": "raster", "source": "osm"}]));
        assert_eq!(
            validate(&value),
            vec![r#"layers[0]: layer "r" requires a raster source"#]
        );
    }

    #[test]
    fn unknown_property_and_enum() {
        let value = style(json!([
            {"id": "l", "type": "line", "source": "osm", "source-layer": "x",
             "layout": {"line-cap": "pointy"}, "paint": {"line-sparkle": 1}}
        ]));
        let errors = validate(&value);
        assert_eq!(errors.len(), 2);
        let line_cap = concat!(
            r#"layers[0].layout.line-cap: expected one of ["butt", "round", "square"], "#,
            r#""pointy" found"#
        );
        assert!(errors.contains(&line_cap.to_string()));
        let sparkle = r#"layers[0].paint.line-sparkle: unknown property "line-sparkle""#;
        assert!(errors.contains(&sparkle.to_string()));
    }

    #[test]
    fn array_elements_are_addressed_by_index() {
        let value = json!({
            "version": 8,
            "glyphs": "https://example.com/{fontstack}/{range}.pbf",
            "sources": {"osm": {"type": "vector", "url": "x"}},
            "layers": [{"id": "t", "type": "symbol", "source": "osm", "source-layer": "p",
                        "layout": {"text-font": ["Noto Sans", 3], "text-field": "{name}"}}]
        });
        assert_eq!(
            validate(&value),
            vec!["layers[0].layout.text-font[1]: string expected, number found"]
        );
    }

    #[test]
    fn text_field_needs_glyphs() {
        let value = style(json!([
            {"id": "t", "type": "symbol", "source": "osm", "source-layer": "p",
             "layout": {"text-field": "{name}"}}
        ]));
        assert_eq!(
            validate(&value),
            vec![concat!(
                r#"layers[0].layout.text-field: use of "text-field" "#,
                r#"requires a style "glyphs" property"#
            )]
        );
    }

    #[test]
    fn number_ranges() {
        let value = style(json!([
            {"id": "bg", "type": "background", "minzoom": 30, "paint": {"background-opacity": -1}}
        ]));
        assert_eq!(
            validate(&value),
            vec![
                "layers[0].minzoom: 30 is greater than the maximum value 24",
                "layers[0].paint.background-opacity: -1 is less than the minimum value 0",
            ]
        );
    }

    #[test]
    fn legacy_functions_pass() {
        let value = style(json!([
            {"id": "bg", "type": "background",
             "paint": {"background-color": {"stops": [[0, "#000"], [10, "#fff"]]}}}
        ]));
        assert!(validate(&value).is_empty());
    }

    #[test]
    fn filter_must_be_array() {
        let value = style(json!([
            {"id": "w", "type": "fill", "source": "osm", "source-layer": "x", "filter": {"a": 1}}
        ]));
        assert_eq!(
            validate(&value),
            vec!["layers[0].filter: array expected, object found"]
        );
    }

    #[test]
    fn geojson_requires_data() {
        let value = json!({
            "version": 8,
            "sources": {"points": {"type": "geojson"}},
            "layers": []
        });
        assert_eq!(
            validate(&value),
            vec![r#"sources.points: missing required property "data""#]
        );
    }

    #[test]
    fn closures_are_validators() {
        let always = |_: &Value| vec!["boom".to_string()];
        let validator: &dyn StyleValidator = &always;
        assert_eq!(validator.validate(&json!({})), vec!["boom"]);
    }
}
