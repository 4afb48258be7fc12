#![forbid(unsafe_code)]

//! Font and icon lists that feed property editors.
//!
//! Both lists are derived from the style: fonts from the `glyphs` URL
//! template, icons from the sprite sheet index(es).

use maputnik_core::Sprite;
use serde_json::Value;
use tracing::warn;

use crate::fetch::{FetchResult, Fetcher};

const GLYPH_SUFFIXES: [&str; 2] = ["{fontstack}/{range}.pbf", "%7Bfontstack%7D/%7Brange%7D.pbf"];
const FONT_LIST_FILE: &str = "fontstacks.json";
const DEFAULT_SHEET: &str = "default";

/// URL of the font list that sits next to a glyph URL template.
///
/// `None` when the template does not end in the usual `{fontstack}/{range}.pbf`.
#[must_use]
pub fn font_list_url(glyphs: &str) -> Option<String> {
    GLYPH_SUFFIXES.iter().find_map(|suffix| {
        glyphs
            .strip_suffix(suffix)
            .map(|base| format!("{base}{FONT_LIST_FILE}"))
    })
}

/// Fetch the font stack names for a glyph template. An unusable template
/// yields an empty list.
pub fn fetch_fonts(fetcher: &dyn Fetcher, glyphs: &str) -> FetchResult<Vec<String>> {
    let Some(url) = font_list_url(glyphs) else {
        warn!(glyphs, "glyphs URL has no {{fontstack}}/{{range}}.pbf suffix; no font list");
        return Ok(Vec::new());
    };
    let value = fetcher.fetch_json(&url)?;
    Ok(value
        .as_array()
        .map(|fonts| {
            fonts
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}

/// Sheet index URLs paired with the prefix their icon names get.
#[must_use]
pub fn icon_index_urls(sprite: &Sprite) -> Vec<(String, String)> {
    match sprite {
        Sprite::Url(url) => vec![(String::new(), format!("{url}.json"))],
        Sprite::Sheets(sheets) => sheets
            .iter()
            .map(|sheet| {
                let prefix = if sheet.id == DEFAULT_SHEET {
                    String::new()
                } else {
                    format!("{}:", sheet.id)
                };
                (prefix, format!("{}.json", sheet.url))
            })
            .collect(),
    }
}

/// Fetch every icon name across the sprite sheets, prefixed by sheet id.
///
/// A sheet that fails to load is skipped with a warning; the others still
/// contribute.
pub fn fetch_icons(fetcher: &dyn Fetcher, sprite: &Sprite) -> Vec<String> {
    let mut icons = Vec::new();
    for (prefix, url) in icon_index_urls(sprite) {
        match fetcher.fetch_json(&url) {
            Ok(Value::Object(index)) => {
                icons.extend(index.keys().map(|name| format!("{prefix}{name}")));
            }
            Ok(_) => warn!(url, "sprite index is not an object"),
            Err(err) => warn!(url, error = %err, "could not load sprite index"),
        }
    }
    icons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use maputnik_core::SpriteSheet;
    use serde_json::json;

    #[test]
    fn font_list_url_from_template() {
        assert_eq!(
            font_list_url("https://x/fonts/{fontstack}/{range}.pbf").as_deref(),
            Some("https://x/fonts/fontstacks.json")
        );
        assert_eq!(
            font_list_url("https://x/%7Bfontstack%7D/%7Brange%7D.pbf").as_deref(),
            Some("https://x/fontstacks.json")
        );
        assert_eq!(font_list_url("https://x/glyphs.pbf"), None);
    }

    #[test]
    fn fonts_are_read_from_list() {
        let fetcher = StaticFetcher::new().with_json(
            "https://x/fontstacks.json",
            json!(["Noto Sans Regular", "Open Sans Bold", 3]),
        );
        let fonts = fetch_fonts(&fetcher, "https://x/{fontstack}/{range}.pbf").unwrap();
        assert_eq!(fonts, vec!["Noto Sans Regular", "Open Sans Bold"]);
        assert!(fetch_fonts(&fetcher, "https://x/bad").unwrap().is_empty());
    }

    #[test]
    fn icons_are_prefixed_per_sheet() {
        let fetcher = StaticFetcher::new()
            .with_json("https://x/base.json", json!({"a": {}, "b": {}}))
            .with_json("https://x/poi.json", json!({"cafe": {}}));
        let sprite = Sprite::Sheets(vec![
            SpriteSheet {
                id: "default".into(),
                url: "https://x/base".into(),
            },
            SpriteSheet {
                id: "poi".into(),
                url: "https://x/poi".into(),
            },
            SpriteSheet {
                id: "gone".into(),
                url: "https://x/missing".into(),
            },
        ]);
        let mut icons = fetch_icons(&fetcher, &sprite);
        icons.sort();
        assert_eq!(icons, vec!["a", "b", "poi:cafe"]);
    }

    #[test]
    fn single_sprite_url() {
        let sprite = Sprite::Url("https://x/sprite".into());
        assert_eq!(
            icon_index_urls(&sprite),
            vec![(String::new(), "https://x/sprite.json".to_string())]
        );
    }
}
