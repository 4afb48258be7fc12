//! Exporting styles for use outside the editor.
//!
//! Exported documents never carry editor state: editor-private metadata is
//! dropped and access tokens substituted into tile URLs are turned back into
//! `{key}` placeholders.

use std::fmt;
use std::str::FromStr;

use v_htmlescape::escape;

use crate::document::{Sprite, StyleDocument};
use crate::error::Result;
use crate::metadata::StyleMetadata;
use crate::tokens::{TokenService, TokenTable};

const MAPLIBRE_VERSION: &str = "4.7.1";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Html,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

fn restore_placeholder(url: &str, metadata: &StyleMetadata, tokens: &TokenTable) -> String {
    let Some(service) = TokenService::for_url(url) else {
        return url.to_string();
    };
    let candidates = [
        metadata.editor_str(service.metadata_key()),
        tokens.get(service.provider()),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|token| !token.is_empty() && url.contains(token))
        .map_or_else(|| url.to_string(), |token| url.replacen(token, "{key}", 1))
}

/// The document as it should leave the editor.
#[must_use]
pub fn clean_for_export(style: &StyleDocument, tokens: &TokenTable) -> StyleDocument {
    let metadata = &style.metadata;
    let mut out = style.clone();

    out.glyphs = style
        .glyphs
        .as_deref()
        .map(|url| restore_placeholder(url, metadata, tokens));
    out.sprite = style.sprite.clone().map(|sprite| match sprite {
        Sprite::Url(url) => Sprite::Url(restore_placeholder(&url, metadata, tokens)),
        Sprite::Sheets(sheets) => Sprite::Sheets(
            sheets
                .into_iter()
                .map(|mut sheet| {
                    sheet.url = restore_placeholder(&sheet.url, metadata, tokens);
                    sheet
                })
                .collect(),
        ),
    });
    for (id, source) in style.sources.iter() {
        if let Some(url) = &source.url {
            let mut source = source.clone();
            source.url = Some(restore_placeholder(url, metadata, tokens));
            out.sources.insert(id.clone(), source);
        }
    }

    out.metadata.clear_editor();
    out
}

/// Pretty-printed JSON of the cleaned document.
pub fn export_json(style: &StyleDocument, tokens: &TokenTable) -> Result<String> {
    Ok(serde_json::to_string_pretty(&clean_for_export(style, tokens))?)
}

/// A standalone page that renders the cleaned document with MapLibre GL JS.
pub fn export_html(style: &StyleDocument, tokens: &TokenTable) -> Result<String> {
    let cleaned = clean_for_export(style, tokens);
    // Inline JSON must not be able to close the script element.
    let json = serde_json::to_string(&cleaned)?.replace('<', "\\u003c");
    let title = cleaned.name.as_deref().unwrap_or("Map");

    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>{title}</title>
  <meta name="viewport" content="initial-scale=1,maximum-scale=1,user-scalable=no">
  <script src="https://unpkg.com/maplibre-gl@{version}/dist/maplibre-gl.js"></script>
  <link href="https://unpkg.com/maplibre-gl@{version}/dist/maplibre-gl.css" rel="stylesheet">
  <style>
    body {{ margin: 0; padding: 0; }}
    #map {{ position: absolute; top: 0; bottom: 0; width: 100%; }}
  </style>
</head>
<body>
  <div id="map"></div>
  <script>
    const map = new maplibregl.Map({{ container: "map", style: {json} }});
    map.addControl(new maplibregl.NavigationControl());
  </script>
</body>
</html>
"#,
        title = escape(title),
        version = MAPLIBRE_VERSION,
    ))
}

/// File name offered for the download: the style name reduced to
/// `[a-z0-9_]`, or the id when the name is empty.
#[must_use]
pub fn export_file_name(style: &StyleDocument, format: ExportFormat) -> String {
    let slug: String = style
        .name
        .as_deref()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let stem = if !slug.trim_matches('_').is_empty() {
        slug
    } else if style.id.is_empty() {
        "style".to_string()
    } else {
        style.id.clone()
    };
    format!("{stem}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{SourceDescriptor, empty_style};
    use crate::metadata::EditorKey;
    use crate::tokens::{TokenProvider, substitute_tokens};
    use serde_json::json;

    fn tokens() -> TokenTable {
        TokenTable::empty().with_token(TokenProvider::OpenMapTiles, "secret")
    }

    fn style() -> StyleDocument {
        let mut style = empty_style();
        style.name = Some("My <Style>".into());
        style.metadata.set_user("author", json!("me"));
        style.metadata.set_editor(EditorKey::Renderer, json!("mlgljs"));
        style.metadata.set_editor(EditorKey::LocationIqAccessToken, json!("liq"));
        style.sources.insert(
            "omt".into(),
            SourceDescriptor::vector_url("https://api.maptiler.com/tiles/v3/tiles.json?key={key}"),
        );
        style
    }

    #[test]
    fn editor_metadata_is_removed() {
        let cleaned = clean_for_export(&style(), &tokens());
        assert_eq!(cleaned.metadata.editor_keys().count(), 0);
        assert_eq!(cleaned.metadata.user().get("author"), Some(&json!("me")));
    }

    #[test]
    fn substituted_tokens_become_placeholders_again() {
        let original = style();
        let substituted = substitute_tokens(&original, &tokens());
        assert!(substituted.sources["omt"].url.as_deref().unwrap().ends_with("key=secret"));

        let cleaned = clean_for_export(&substituted, &tokens());
        assert_eq!(cleaned.sources["omt"], original.sources["omt"]);
    }

    const OUTDOORS: &str = "https://tile.thunderforest.com/outdoors.json?apikey={key}";
    const TRANSPORT: &str = "https://tile.thunderforest.com/transport.json?apikey={key}";

    #[test]
    fn each_thunderforest_token_is_restored_on_its_own_url() {
        let mut original = empty_style();
        original
            .metadata
            .set_editor(EditorKey::ThunderforestTransportAccessToken, json!("tr-token"));
        original
            .metadata
            .set_editor(EditorKey::ThunderforestOutdoorsAccessToken, json!("od-token"));
        original.sources.insert(
            "outdoors".into(),
            SourceDescriptor::vector_url(OUTDOORS),
        );
        original.sources.insert(
            "transport".into(),
            SourceDescriptor::vector_url(TRANSPORT),
        );

        let substituted = substitute_tokens(&original, &TokenTable::empty());
        assert_eq!(
            substituted.sources["outdoors"].url.as_deref(),
            Some("https://tile.thunderforest.com/outdoors.json?apikey=od-token")
        );
        assert_eq!(
            substituted.sources["transport"].url.as_deref(),
            Some("https://tile.thunderforest.com/transport.json?apikey=tr-token")
        );

        let cleaned = clean_for_export(&substituted, &TokenTable::empty());
        assert_eq!(cleaned.sources["outdoors"], original.sources["outdoors"]);
        assert_eq!(cleaned.sources["transport"], original.sources["transport"]);
    }

    #[test]
    fn json_export_has_no_editor_keys() {
        let json = export_json(&style(), &tokens()).unwrap();
        assert!(!json.contains("maputnik:"));
        assert!(json.contains("\"author\""));
    }

    #[test]
    fn html_export_escapes_title_and_script() {
        let html = export_html(&style(), &tokens()).unwrap();
        assert!(html.contains("<title>My &lt;Style&gt;</title>"));
        assert!(html.contains(r#""name":"My \u003cStyle>""#));
        assert!(!html.contains("My <Style>"));
        assert!(html.contains("maplibregl.Map"));
    }

    #[test]
    fn file_names() {
        assert_eq!(export_file_name(&style(), ExportFormat::Html), "my__style_.html");
        let mut unnamed = style();
        unnamed.name = None;
        unnamed.id = "abc123".into();
        assert_eq!(export_file_name(&unnamed, ExportFormat::Json), "abc123.json");
    }

    #[test]
    fn format_parsing() {
        assert_eq!("HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
