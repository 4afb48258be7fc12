#![forbid(unsafe_code)]

//! Resolution of the vector layers each source offers.
//!
//! Vector sources that point at a URL (TileJSON or `pmtiles://`) are
//! fetched in the background; every other source resolves immediately to
//! its declared descriptor with no layers.

use im::OrdMap;
use maputnik_core::{SourceDescriptor, StyleDocument};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::fetch::{FetchResult, Fetcher};
use crate::pmtiles;

/// A declared source plus the vector layer ids it exposes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSource {
    pub descriptor: SourceDescriptor,
    pub layers: Vec<String>,
    /// False while the layer list of a fetchable source is still unknown.
    #[serde(skip)]
    pub fetched: bool,
}

pub type ResolvedSources = OrdMap<String, ResolvedSource>;

/// A fetch the resolver wants run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    pub source_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionPlan {
    pub resolved: ResolvedSources,
    pub fetches: Vec<PendingFetch>,
}

/// Stateless planner for source resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceResolver;

impl SourceResolver {
    /// Compute the resolved map for `style` given the `previous` one.
    ///
    /// A vector source whose URL was already fetched keeps its layers and
    /// is not fetched again. Sources still waiting on a fetch are queued
    /// again.
    #[must_use]
    pub fn plan(&self, style: &StyleDocument, previous: &ResolvedSources) -> ResolutionPlan {
        let mut resolved = ResolvedSources::new();
        let mut fetches = Vec::new();

        for (id, descriptor) in &style.sources {
            let carried = previous
                .get(id)
                .filter(|prev| prev.fetched && prev.descriptor.url == descriptor.url);
            let layers = carried.map(|prev| prev.layers.clone()).unwrap_or_default();
            let mut fetched = true;

            if carried.is_none()
                && descriptor.is_vector_with_url()
                && let Some(url) = &descriptor.url
            {
                fetched = false;
                fetches.push(PendingFetch {
                    source_id: id.clone(),
                    url: url.clone(),
                });
            }
            resolved.insert(
                id.clone(),
                ResolvedSource {
                    descriptor: descriptor.clone(),
                    layers,
                    fetched,
                },
            );
        }

        debug!(
            sources = resolved.len(),
            fetches = fetches.len(),
            "planned source resolution"
        );
        ResolutionPlan { resolved, fetches }
    }

    /// Fold a finished fetch into `resolved`.
    ///
    /// Returns `None` when the source was removed from `style` or now points
    /// at a different URL.
    #[must_use]
    pub fn apply(
        &self,
        style: &StyleDocument,
        resolved: &ResolvedSources,
        source_id: &str,
        url: &str,
        layers: Vec<String>,
    ) -> Option<ResolvedSources> {
        let current = style.source(source_id)?;
        if current.url.as_deref() != Some(url) {
            debug!(source_id, url, "dropping stale source resolution");
            return None;
        }
        let mut next = resolved.clone();
        next.insert(
            source_id.to_string(),
            ResolvedSource {
                descriptor: current.clone(),
                layers,
                fetched: true,
            },
        );
        Some(next)
    }
}

/// `vector_layers[].id` of a TileJSON or PMTiles metadata document.
#[must_use]
pub fn vector_layer_ids(metadata: &Value) -> Vec<String> {
    metadata
        .get("vector_layers")
        .and_then(Value::as_array)
        .map(|layers| {
            layers
                .iter()
                .filter_map(|layer| layer.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Fetch the vector layer ids behind a source URL.
pub fn fetch_vector_layers(fetcher: &dyn Fetcher, url: &str) -> FetchResult<Vec<String>> {
    let metadata = match pmtiles::archive_url(url) {
        Some(archive) => pmtiles::read_metadata(fetcher, archive)?,
        None => fetcher.fetch_json(url)?,
    };
    Ok(vector_layer_ids(&metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use maputnik_core::{SourceKind, empty_style};
    use serde_json::json;

    fn style() -> StyleDocument {
        let mut style = empty_style();
        style.sources.insert(
            "osm".into(),
            SourceDescriptor::vector_url("https://x/tiles.json"),
        );
        style.sources.insert(
            "pm".into(),
            SourceDescriptor::vector_url("pmtiles://https://x/a.pmtiles"),
        );
        style
            .sources
            .insert("dem".into(), SourceDescriptor::new(SourceKind::RasterDem));
        style.sources.insert(
            "points".into(),
            SourceDescriptor::geojson(json!({"type": "FeatureCollection", "features": []})),
        );
        style
    }

    #[test]
    fn plan_fetches_only_unresolved_vector_urls() {
        let plan = SourceResolver.plan(&style(), &ResolvedSources::new());
        let ids: Vec<_> = plan.fetches.iter().map(|f| f.source_id.as_str()).collect();
        assert_eq!(ids, vec!["osm", "pm"]);
        assert_eq!(plan.resolved.len(), 4);
        assert!(plan.resolved.values().all(|r| r.layers.is_empty()));
    }

    #[test]
    fn resolved_sources_are_carried_over() {
        let style = style();
        let plan = SourceResolver.plan(&style, &ResolvedSources::new());
        let resolved = SourceResolver
            .apply(&style, &plan.resolved, "osm", "https://x/tiles.json", vec!["water".into()])
            .unwrap();

        let again = SourceResolver.plan(&style, &resolved);
        let ids: Vec<_> = again.fetches.iter().map(|f| f.source_id.as_str()).collect();
        assert_eq!(ids, vec!["pm"]);
        assert_eq!(again.resolved["osm"].layers, vec!["water"]);
    }

    #[test]
    fn url_change_triggers_refetch_and_drops_stale_result() {
        let style = style();
        let plan = SourceResolver.plan(&style, &ResolvedSources::new());
        let resolved = SourceResolver
            .apply(&style, &plan.resolved, "osm", "https://x/tiles.json", vec!["water".into()])
            .unwrap();

        let mut moved = style.clone();
        moved.sources.insert(
            "osm".into(),
            SourceDescriptor::vector_url("https://y/tiles.json"),
        );
        let plan = SourceResolver.plan(&moved, &resolved);
        assert!(plan.fetches.iter().any(|f| f.url == "https://y/tiles.json"));
        assert!(plan.resolved["osm"].layers.is_empty());

        assert!(SourceResolver
            .apply(&moved, &plan.resolved, "osm", "https://x/tiles.json", vec![])
            .is_none());
        assert!(SourceResolver
            .apply(&moved, &plan.resolved, "gone", "https://x/tiles.json", vec![])
            .is_none());
    }

    #[test]
    fn fetches_tilejson_and_pmtiles() {
        let metadata = json!({
            "vector_layers": [{"id": "water"}, {"id": "roads"}, {"name": "no-id"}]
        });
        let fetcher = StaticFetcher::new()
            .with_json("https://x/tiles.json", metadata.clone())
            .with_bytes(
                "https://x/a.pmtiles",
                crate::pmtiles::build_archive(&metadata, true),
            );
        assert_eq!(
            fetch_vector_layers(&fetcher, "https://x/tiles.json").unwrap(),
            vec!["water", "roads"]
        );
        assert_eq!(
            fetch_vector_layers(&fetcher, "pmtiles://https://x/a.pmtiles").unwrap(),
            vec!["water", "roads"]
        );
        assert!(fetch_vector_layers(&fetcher, "https://x/missing.json").is_err());
    }
}
