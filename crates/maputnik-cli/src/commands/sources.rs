use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use maputnik_core::substitute_tokens;
use maputnik_runtime::sources::fetch_vector_layers;
use maputnik_runtime::{EditorConfig, Fetcher, HttpFetcher};
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::util::read_style;

#[derive(Debug, Clone, Args)]
pub struct SourcesArgs {
    /// Style document whose sources to resolve.
    pub file: PathBuf,

    /// Print the result as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceReport {
    Resolved { layers: Vec<String> },
    Failed { error: String },
    NotFetchable { source_type: String },
}

pub fn run_sources(args: SourcesArgs, config: &EditorConfig, out: &mut dyn Write) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.fetch)?;
    let reports = resolve_sources(&args.file, config, &fetcher)?;
    print_reports(&reports, args.json, out)
}

pub(crate) fn resolve_sources(
    file: &std::path::Path,
    config: &EditorConfig,
    fetcher: &dyn Fetcher,
) -> Result<BTreeMap<String, SourceReport>> {
    let style = substitute_tokens(&read_style(file)?, &config.token_table());
    let mut reports = BTreeMap::new();
    for (id, source) in &style.sources {
        let report = match source.url.as_deref() {
            Some(url) if source.is_vector_with_url() => match fetch_vector_layers(fetcher, url) {
                Ok(layers) => SourceReport::Resolved { layers },
                Err(err) => {
                    warn!(source = %id, url, error = %err, "could not resolve source");
                    SourceReport::Failed {
                        error: err.to_string(),
                    }
                }
            },
            _ => SourceReport::NotFetchable {
                source_type: source.source_type.clone().unwrap_or_default(),
            },
        };
        reports.insert(id.clone(), report);
    }
    Ok(reports)
}

fn print_reports(
    reports: &BTreeMap<String, SourceReport>,
    as_json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    if as_json {
        writeln!(out, "{}", serde_json::to_string_pretty(reports)?)?;
        return Ok(());
    }
    for (id, report) in reports {
        match report {
            SourceReport::Resolved { layers } => writeln!(out, "{id}: {}", layers.join(", "))?,
            SourceReport::Failed { error } => writeln!(out, "{id}: failed ({error})")?,
            SourceReport::NotFetchable { source_type } => writeln!(out, "{id}: {source_type}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use maputnik_runtime::StaticFetcher;
    use serde_json::json;
    use std::fs;

    #[test]
    fn resolves_vector_sources_and_reports_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("style.json");
        fs::write(
            &file,
            r#"{"version": 8, "layers": [], "sources": {
                "osm": {"type": "vector", "url": "https://tiles.test/osm.json"},
                "broken": {"type": "vector", "url": "https://tiles.test/missing.json"},
                "dem": {"type": "raster-dem", "tiles": ["https://tiles.test/{z}/{x}/{y}.png"]}
            }}"#,
        )
        .unwrap();
        let fetcher = StaticFetcher::new().with_json(
            "https://tiles.test/osm.json",
            json!({"vector_layers": [{"id": "water"}, {"id": "roads"}]}),
        );

        let reports = resolve_sources(&file, &EditorConfig::default(), &fetcher).unwrap();
        assert_eq!(
            reports["osm"],
            SourceReport::Resolved {
                layers: vec!["water".into(), "roads".into()]
            }
        );
        assert!(matches!(reports["broken"], SourceReport::Failed { .. }));
        assert_eq!(
            reports["dem"],
            SourceReport::NotFetchable {
                source_type: "raster-dem".into()
            }
        );

        let mut out = Vec::new();
        print_reports(&reports, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("osm: water, roads\n"));
        assert!(text.contains("dem: raster-dem\n"));
    }
}
