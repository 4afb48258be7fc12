//! Property tables for the layer types of style version 8.
//!
//! Only the facts the built-in validator checks are recorded here: which
//! properties exist in each `paint`/`layout` group and what kind of literal
//! value each accepts. Expressions and legacy functions are accepted for
//! every property and checked no further.

/// Literal value kinds accepted by style properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    Color,
    Number { min: Option<f64>, max: Option<f64> },
    Boolean,
    String,
    Enum(&'static [&'static str]),
    NumberArray,
    StringArray,
    /// Formatted text, padding, gradients: anything goes.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTypeSpec {
    pub name: &'static str,
    pub paint: &'static [PropertySpec],
    pub layout: &'static [PropertySpec],
    /// Source types a layer of this type may draw from; empty for sourceless layers.
    pub source_types: &'static [&'static str],
}

impl LayerTypeSpec {
    #[must_use]
    pub fn needs_source(&self) -> bool {
        !self.source_types.is_empty()
    }

    #[must_use]
    pub fn paint_property(&self, name: &str) -> Option<&'static PropertySpec> {
        self.paint.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn layout_property(&self, name: &str) -> Option<&'static PropertySpec> {
        self.layout.iter().find(|p| p.name == name)
    }
}

const fn prop(name: &'static str, kind: ValueKind) -> PropertySpec {
    PropertySpec { name, kind }
}

const NUMBER: ValueKind = ValueKind::Number {
    min: None,
    max: None,
};
const NON_NEGATIVE: ValueKind = ValueKind::Number {
    min: Some(0.0),
    max: None,
};
const UNIT: ValueKind = ValueKind::Number {
    min: Some(0.0),
    max: Some(1.0),
};
const SIGNED_UNIT: ValueKind = ValueKind::Number {
    min: Some(-1.0),
    max: Some(1.0),
};

const ANCHOR: ValueKind = ValueKind::Enum(&["map", "viewport"]);
const ALIGNMENT: ValueKind = ValueKind::Enum(&["map", "viewport", "auto"]);
const POSITION: ValueKind = ValueKind::Enum(&[
    "center",
    "left",
    "right",
    "top",
    "bottom",
    "top-left",
    "top-right",
    "bottom-left",
    "bottom-right",
]);

pub const VISIBILITY: PropertySpec = prop("visibility", ValueKind::Enum(&["visible", "none"]));

const VECTOR_SOURCES: &[&str] = &["vector", "geojson"];

pub const ZOOM_MIN: f64 = 0.0;
pub const ZOOM_MAX: f64 = 24.0;

pub static LAYER_TYPES: &[LayerTypeSpec] = &[
    LayerTypeSpec {
        name: "background",
        paint: &[
            prop("background-color", ValueKind::Color),
            prop("background-pattern", ValueKind::String),
            prop("background-opacity", UNIT),
        ],
        layout: &[VISIBILITY],
        source_types: &[],
    },
    LayerTypeSpec {
        name: "fill",
        paint: &[
            prop("fill-antialias", ValueKind::Boolean),
            prop("fill-opacity", UNIT),
            prop("fill-color", ValueKind::Color),
            prop("fill-outline-color", ValueKind::Color),
            prop("fill-translate", ValueKind::NumberArray),
            prop("fill-translate-anchor", ANCHOR),
            prop("fill-pattern", ValueKind::String),
        ],
        layout: &[prop("fill-sort-key", NUMBER), VISIBILITY],
        source_types: VECTOR_SOURCES,
    },
    LayerTypeSpec {
        name: "line",
        paint: &[
            prop("line-opacity", UNIT),
            prop("line-color", ValueKind::Color),
            prop("line-translate", ValueKind::NumberArray),
            prop("line-translate-anchor", ANCHOR),
            prop("line-width", NON_NEGATIVE),
            prop("line-gap-width", NON_NEGATIVE),
            prop("line-offset", NUMBER),
            prop("line-blur", NON_NEGATIVE),
            prop("line-dasharray", ValueKind::NumberArray),
            prop("line-pattern", ValueKind::String),
            prop("line-gradient", ValueKind::Any),
        ],
        layout: &[
            prop("line-cap", ValueKind::Enum(&["butt", "round", "square"])),
            prop("line-join", ValueKind::Enum(&["bevel", "round", "miter"])),
            prop("line-miter-limit", NUMBER),
            prop("line-round-limit", NUMBER),
            prop("line-sort-key", NUMBER),
            VISIBILITY,
        ],
        source_types: VECTOR_SOURCES,
    },
    LayerTypeSpec {
        name: "symbol",
        paint: &[
            prop("icon-opacity", UNIT),
            prop("icon-color", ValueKind::Color),
            prop("icon-halo-color", ValueKind::Color),
            prop("icon-halo-width", NON_NEGATIVE),
            prop("icon-halo-blur", NON_NEGATIVE),
            prop("icon-translate", ValueKind::NumberArray),
            prop("icon-translate-anchor", ANCHOR),
            prop("text-opacity", UNIT),
            prop("text-color", ValueKind::Color),
            prop("text-halo-color", ValueKind::Color),
            prop("text-halo-width", NON_NEGATIVE),
            prop("text-halo-blur", NON_NEGATIVE),
            prop("text-translate", ValueKind::NumberArray),
            prop("text-translate-anchor", ANCHOR),
        ],
        layout: &[
            prop(
                "symbol-placement",
                ValueKind::Enum(&["point", "line", "line-center"]),
            ),
            prop(
                "symbol-spacing",
                ValueKind::Number {
                    min: Some(1.0),
                    max: None,
                },
            ),
            prop("symbol-avoid-edges", ValueKind::Boolean),
            prop("symbol-sort-key", NUMBER),
            prop(
                "symbol-z-order",
                ValueKind::Enum(&["auto", "viewport-y", "source"]),
            ),
            prop("icon-allow-overlap", ValueKind::Boolean),
            prop("icon-ignore-placement", ValueKind::Boolean),
            prop("icon-optional", ValueKind::Boolean),
            prop("icon-rotation-alignment", ALIGNMENT),
            prop("icon-size", NON_NEGATIVE),
            prop(
                "icon-text-fit",
                ValueKind::Enum(&["none", "width", "height", "both"]),
            ),
            prop("icon-text-fit-padding", ValueKind::NumberArray),
            prop("icon-image", ValueKind::String),
            prop("icon-rotate", NUMBER),
            prop("icon-padding", ValueKind::Any),
            prop("icon-keep-upright", ValueKind::Boolean),
            prop("icon-offset", ValueKind::NumberArray),
            prop("icon-anchor", POSITION),
            prop("icon-pitch-alignment", ALIGNMENT),
            prop("text-pitch-alignment", ALIGNMENT),
            prop(
                "text-rotation-alignment",
                ValueKind::Enum(&["map", "viewport", "viewport-glyph", "auto"]),
            ),
            prop("text-field", ValueKind::Any),
            prop("text-font", ValueKind::StringArray),
            prop("text-size", NON_NEGATIVE),
            prop("text-max-width", NON_NEGATIVE),
            prop("text-line-height", NUMBER),
            prop("text-letter-spacing", NUMBER),
            prop(
                "text-justify",
                ValueKind::Enum(&["auto", "left", "center", "right"]),
            ),
            prop("text-radial-offset", NUMBER),
            prop("text-variable-anchor", ValueKind::StringArray),
            prop("text-anchor", POSITION),
            prop("text-max-angle", NUMBER),
            prop("text-writing-mode", ValueKind::StringArray),
            prop("text-rotate", NUMBER),
            prop("text-padding", NON_NEGATIVE),
            prop("text-keep-upright", ValueKind::Boolean),
            prop(
                "text-transform",
                ValueKind::Enum(&["none", "uppercase", "lowercase"]),
            ),
            prop("text-offset", ValueKind::NumberArray),
            prop("text-allow-overlap", ValueKind::Boolean),
            prop("text-ignore-placement", ValueKind::Boolean),
            prop("text-optional", ValueKind::Boolean),
            VISIBILITY,
        ],
        source_types: VECTOR_SOURCES,
    },
    LayerTypeSpec {
        name: "raster",
        paint: &[
            prop("raster-opacity", UNIT),
            prop("raster-hue-rotate", NUMBER),
            prop("raster-brightness-min", UNIT),
            prop("raster-brightness-max", UNIT),
            prop("raster-saturation", SIGNED_UNIT),
            prop("raster-contrast", SIGNED_UNIT),
            prop("raster-resampling", ValueKind::Enum(&["linear", "nearest"])),
            prop("raster-fade-duration", NON_NEGATIVE),
        ],
        layout: &[VISIBILITY],
        source_types: &["raster"],
    },
    LayerTypeSpec {
        name: "circle",
        paint: &[
            prop("circle-radius", NON_NEGATIVE),
            prop("circle-color", ValueKind::Color),
            prop("circle-blur", NUMBER),
            prop("circle-opacity", UNIT),
            prop("circle-translate", ValueKind::NumberArray),
            prop("circle-translate-anchor", ANCHOR),
            prop("circle-pitch-scale", ANCHOR),
            prop("circle-pitch-alignment", ANCHOR),
            prop("circle-stroke-width", NON_NEGATIVE),
            prop("circle-stroke-color", ValueKind::Color),
            prop("circle-stroke-opacity", UNIT),
        ],
        layout: &[prop("circle-sort-key", NUMBER), VISIBILITY],
        source_types: VECTOR_SOURCES,
    },
    LayerTypeSpec {
        name: "fill-extrusion",
        paint: &[
            prop("fill-extrusion-opacity", UNIT),
            prop("fill-extrusion-color", ValueKind::Color),
            prop("fill-extrusion-translate", ValueKind::NumberArray),
            prop("fill-extrusion-translate-anchor", ANCHOR),
            prop("fill-extrusion-pattern", ValueKind::String),
            prop("fill-extrusion-height", NON_NEGATIVE),
            prop("fill-extrusion-base", NON_NEGATIVE),
            prop("fill-extrusion-vertical-gradient", ValueKind::Boolean),
        ],
        layout: &[VISIBILITY],
        source_types: VECTOR_SOURCES,
    },
    LayerTypeSpec {
        name: "heatmap",
        paint: &[
            prop(
                "heatmap-radius",
                ValueKind::Number {
                    min: Some(1.0),
                    max: None,
                },
            ),
            prop("heatmap-weight", NON_NEGATIVE),
            prop("heatmap-intensity", NON_NEGATIVE),
            prop("heatmap-color", ValueKind::Any),
            prop("heatmap-opacity", UNIT),
        ],
        layout: &[VISIBILITY],
        source_types: VECTOR_SOURCES,
    },
    LayerTypeSpec {
        name: "hillshade",
        paint: &[
            prop(
                "hillshade-illumination-direction",
                ValueKind::Number {
                    min: Some(0.0),
                    max: Some(359.0),
                },
            ),
            prop("hillshade-illumination-anchor", ANCHOR),
            prop("hillshade-exaggeration", UNIT),
            prop("hillshade-shadow-color", ValueKind::Color),
            prop("hillshade-highlight-color", ValueKind::Color),
            prop("hillshade-accent-color", ValueKind::Color),
        ],
        layout: &[VISIBILITY],
        source_types: &["raster-dem"],
    },
];

/// Expression operators recognised at the head of an array value.
pub static EXPRESSION_OPERATORS: &[&str] = &[
    "!", "!=", "%", "*", "+", "-", "/", "<", "<=", "==", ">", ">=", "^", "abs", "all", "any",
    "array", "at", "boolean", "case", "ceil", "coalesce", "collator", "concat", "downcase", "e",
    "feature-state", "floor", "format", "geometry-type", "get", "has", "heatmap-density", "id",
    "image", "in", "index-of", "interpolate", "interpolate-hcl", "interpolate-lab",
    "is-supported-script", "length", "let", "line-progress", "literal", "ln", "ln2", "log10",
    "log2", "match", "max", "min", "number", "number-format", "object", "pi", "properties",
    "resolved-locale", "round", "sin", "slice", "sqrt", "step", "string", "to-boolean",
    "to-color", "to-number", "to-rgba", "to-string", "typeof", "upcase", "var", "within",
    "zoom", "!has", "!in", "none",
];

/// Names of every known layer type, in table order.
#[must_use]
pub fn layer_type_names() -> Vec<&'static str> {
    LAYER_TYPES.iter().map(|spec| spec.name).collect()
}

#[must_use]
pub fn layer_type(name: &str) -> Option<&'static LayerTypeSpec> {
    LAYER_TYPES.iter().find(|spec| spec.name == name)
}

#[must_use]
pub fn is_expression_operator(name: &str) -> bool {
    EXPRESSION_OPERATORS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_visibility() {
        for spec in LAYER_TYPES {
            assert!(
                spec.layout_property("visibility").is_some(),
                "{} lacks visibility",
                spec.name
            );
        }
    }

    #[test]
    fn property_names_carry_type_prefix() {
        for spec in LAYER_TYPES {
            let prefixes: &[&str] = if spec.name == "symbol" {
                &["icon-", "text-", "symbol-"]
            } else {
                &[]
            };
            for property in spec.paint {
                let own = format!("{}-", spec.name);
                assert!(
                    property.name.starts_with(&own)
                        || prefixes.iter().any(|p| property.name.starts_with(p)),
                    "{} in {}",
                    property.name,
                    spec.name
                );
            }
        }
    }

    #[test]
    fn only_background_is_sourceless() {
        let sourceless: Vec<_> = LAYER_TYPES
            .iter()
            .filter(|spec| !spec.needs_source())
            .map(|spec| spec.name)
            .collect();
        assert_eq!(sourceless, vec!["background"]);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(
            layer_type("fill").and_then(|s| s.paint_property("fill-color")).map(|p| p.kind),
            Some(ValueKind::Color)
        );
        assert!(layer_type("sky").is_none());
        assert!(is_expression_operator("interpolate"));
        assert!(!is_expression_operator("Open Sans Regular"));
    }
}
