//! Linear-scan in-memory catalog. Grounded on the predecessor's
//! `MemoryCatalog`/`MemoryAdapter` (filter by zoom + intersecting
//! geometry, sort by priority/resolution/centroid-distance, dedup) and
//! generalized to the coverage-mode greedy cover described in §4.3.

use std::collections::HashSet;

use geo::{Area, BooleanOps, Centroid, Intersects, MultiPolygon, Point, Polygon};

use super::{Catalog, QueryMode, Source};
use crate::error::RenderResult;
use crate::geometry::Bounds;

#[derive(Debug, Clone)]
struct Entry {
    footprint: Polygon<f64>,
    source: Source,
}

/// An in-memory catalog backed by a `Vec` of (footprint, source) pairs.
/// Query bounds are expected in WGS84, matching every footprint's CRS.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: Vec<Entry>,
    declared_bounds: Option<Bounds>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, footprint: Polygon<f64>, source: Source) {
        self.entries.push(Entry { footprint, source });
    }

    fn bounds_polygon(bounds: &Bounds) -> Polygon<f64> {
        use geo::{coord, LineString};
        Polygon::new(
            LineString::new(vec![
                coord! { x: bounds.minx, y: bounds.miny },
                coord! { x: bounds.maxx, y: bounds.miny },
                coord! { x: bounds.maxx, y: bounds.maxy },
                coord! { x: bounds.minx, y: bounds.maxy },
                coord! { x: bounds.minx, y: bounds.miny },
            ]),
            vec![],
        )
    }

    fn range_query(&self, bounds: &Bounds, min_zoom: u8, max_zoom: u8) -> Vec<Source> {
        let query_poly = Self::bounds_polygon(bounds);
        let centroid = query_poly.centroid();

        let mut candidates: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| {
                e.source.max_zoom >= min_zoom
                    && e.source.min_zoom <= max_zoom
                    && e.footprint.intersects(&query_poly)
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.source
                .priority
                .total_cmp(&a.source.priority)
                .then_with(|| {
                    a.source
                        .resolution
                        .round()
                        .total_cmp(&b.source.resolution.round())
                })
                .then_with(|| {
                    let da = centroid_distance(&centroid, &a.footprint);
                    let db = centroid_distance(&centroid, &b.footprint);
                    da.total_cmp(&db)
                })
        });

        dedup_by_source_url(candidates.into_iter().map(|e| e.source.clone()))
    }

    fn coverage_query(&self, bounds: &Bounds, resolution_m: f64, zoom: u8) -> Vec<Source> {
        let query_poly = Self::bounds_polygon(bounds);
        let query_area = query_poly.unsigned_area();

        let mut remaining: Vec<&Entry> = self
            .entries
            .iter()
            .filter(|e| e.source.max_zoom >= zoom && e.source.min_zoom <= zoom)
            .filter(|e| e.footprint.intersects(&query_poly))
            .collect();

        // "Recency vs corpus age range" (§4.3) is observed once, over the
        // whole candidate pool, rather than recomputed as entries are
        // consumed — otherwise the range would shrink every iteration and
        // the most/least recent remaining source would always score as
        // if it were the edge of the range.
        let age_range = acquired_at_range(remaining.iter().map(|e| &e.source.acquired_at));

        let mut covered: Option<MultiPolygon<f64>> = None;
        let mut ordered = Vec::new();

        while !remaining.is_empty() {
            let covered_area = covered
                .as_ref()
                .map(MultiPolygon::unsigned_area)
                .unwrap_or(0.0);
            if query_area > 0.0 && covered_area / query_area >= 0.999 {
                break;
            }

            let (best_idx, best_entry) = remaining
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    score(a, resolution_m, &covered, &query_poly, age_range)
                        .total_cmp(&score(b, resolution_m, &covered, &query_poly, age_range))
                })
                .expect("remaining is non-empty");

            let added = MultiPolygon::new(vec![best_entry.footprint.clone()]);
            covered = Some(match covered.take() {
                Some(existing) => existing.union(&added),
                None => added,
            });
            ordered.push(best_entry.source.clone());
            remaining.remove(best_idx);
        }

        dedup_by_source_url(ordered.into_iter())
    }
}

fn centroid_distance(centroid: &Option<Point<f64>>, footprint: &Polygon<f64>) -> f64 {
    match (centroid, footprint.centroid()) {
        (Some(a), Some(b)) => geo::EuclideanDistance::euclidean_distance(a, &b),
        _ => f64::MAX,
    }
}

/// Coarse, monotonic ordinal for an ISO-8601-prefixed `acquired_at`
/// (`YYYY-MM-DD...`), used only to rank sources against each other —
/// not a calendar-accurate day count, but comparable across sources and
/// linearly interpolatable for a normalized "recency vs corpus range"
/// term. Unparseable or absent timestamps contribute no recency signal.
fn acquired_at_ordinal(acquired_at: &Option<String>) -> Option<f64> {
    let s = acquired_at.as_deref()?;
    if s.len() < 10 || s.as_bytes()[4] != b'-' || s.as_bytes()[7] != b'-' {
        return None;
    }
    let year: f64 = s.get(0..4)?.parse().ok()?;
    let month: f64 = s.get(5..7)?.parse().ok()?;
    let day: f64 = s.get(8..10)?.parse().ok()?;
    Some(year * 372.0 + month * 31.0 + day)
}

/// The oldest/newest parseable `acquired_at` across a candidate pool,
/// i.e. the "corpus age range" the recency term normalizes against.
/// `None` if nothing in the pool has a parseable timestamp.
fn acquired_at_range<'a>(acquired_ats: impl Iterator<Item = &'a Option<String>>) -> Option<(f64, f64)> {
    let ordinals: Vec<f64> = acquired_ats.filter_map(acquired_at_ordinal).collect();
    if ordinals.is_empty() {
        return None;
    }
    let min = ordinals.iter().copied().fold(f64::INFINITY, f64::min);
    let max = ordinals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

/// `0.0` (oldest in the corpus) to `1.0` (newest), linearly interpolated
/// across `age_range`. A source with no timestamp, or a corpus where
/// every timestamp collapses to the same value, contributes no signal.
fn recency_score(acquired_at: &Option<String>, age_range: Option<(f64, f64)>) -> f64 {
    match (acquired_at_ordinal(acquired_at), age_range) {
        (Some(ordinal), Some((min, max))) if max > min => (ordinal - min) / (max - min),
        _ => 0.0,
    }
}

fn score(
    entry: &Entry,
    resolution_m: f64,
    covered: &Option<MultiPolygon<f64>>,
    query_poly: &Polygon<f64>,
    age_range: Option<(f64, f64)>,
) -> f64 {
    let overzoom_penalty = if entry.source.resolution < resolution_m {
        (resolution_m / entry.source.resolution.max(f64::EPSILON)).ln().max(0.0)
    } else {
        0.0
    };
    let underzoom_penalty = if entry.source.resolution > resolution_m {
        1.0 / entry.source.resolution.max(f64::EPSILON)
    } else {
        0.0
    };

    let new_area = match covered {
        Some(existing) => {
            let added = MultiPolygon::new(vec![entry.footprint.clone()]);
            added.difference(existing).unsigned_area()
        }
        None => entry.footprint.unsigned_area(),
    };
    let _ = query_poly;

    let recency = recency_score(&entry.source.acquired_at, age_range);

    entry.source.priority * 10.0 - overzoom_penalty - underzoom_penalty + new_area.ln_1p() + recency * 5.0
}

fn dedup_by_source_url(sources: impl Iterator<Item = Source>) -> Vec<Source> {
    let mut seen = HashSet::new();
    sources
        .filter(|s| seen.insert((s.name.clone(), s.url.clone())))
        .collect()
}

impl Catalog for MemoryCatalog {
    fn get_sources(
        &self,
        bounds: &Bounds,
        resolution_m: f64,
        mode: QueryMode,
    ) -> RenderResult<Vec<Source>> {
        use crate::geometry::{zoom_for_resolution, RoundOp};

        let zoom = zoom_for_resolution(resolution_m, RoundOp::Round);

        Ok(match mode {
            QueryMode::Range { min_zoom, max_zoom } => self.range_query(bounds, min_zoom, max_zoom),
            QueryMode::Coverage => self.coverage_query(bounds, resolution_m, zoom),
        })
    }

    fn bounds(&self) -> Bounds {
        self.declared_bounds.unwrap_or(crate::geometry::Crs::Wgs84.extent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, LineString};

    fn square(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::new(vec![
                coord! { x: minx, y: miny },
                coord! { x: maxx, y: miny },
                coord! { x: maxx, y: maxy },
                coord! { x: minx, y: maxy },
                coord! { x: minx, y: miny },
            ]),
            vec![],
        )
    }

    fn source(name: &str, url: &str, priority: f64, resolution: f64) -> Source {
        source_acquired(name, url, priority, resolution, None)
    }

    fn source_acquired(name: &str, url: &str, priority: f64, resolution: f64, acquired_at: Option<&str>) -> Source {
        Source {
            url: url.into(),
            name: name.into(),
            resolution,
            band_info: Default::default(),
            meta: serde_json::Value::Null,
            recipes: Default::default(),
            acquired_at: acquired_at.map(str::to_string),
            band: None,
            priority,
            coverage: 1.0,
            geom: None,
            mask: None,
            filename: None,
            min_zoom: 0,
            max_zoom: 22,
        }
    }

    #[test]
    fn range_query_dedups_by_source_and_url() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_source(square(-1.0, -1.0, 1.0, 1.0), source("a", "u1", 1.0, 10.0));
        catalog.add_source(square(-1.0, -1.0, 1.0, 1.0), source("a", "u1", 1.0, 10.0));
        catalog.add_source(square(-1.0, -1.0, 1.0, 1.0), source("b", "u2", 2.0, 5.0));

        let bounds = Bounds::new(-0.5, -0.5, 0.5, 0.5, crate::geometry::Crs::Wgs84);
        let results = catalog
            .get_sources(&bounds, 10.0, QueryMode::Range { min_zoom: 0, max_zoom: 22 })
            .unwrap();

        assert_eq!(results.len(), 2);
        // priority DESC first
        assert_eq!(results[0].name, "b");
    }

    #[test]
    fn coverage_query_stops_once_fully_covered() {
        let mut catalog = MemoryCatalog::new();
        catalog.add_source(square(-10.0, -10.0, 10.0, 10.0), source("big", "u1", 5.0, 10.0));
        catalog.add_source(square(-1.0, -1.0, 1.0, 1.0), source("small", "u2", 1.0, 1.0));

        let bounds = Bounds::new(-2.0, -2.0, 2.0, 2.0, crate::geometry::Crs::Wgs84);
        let results = catalog
            .get_sources(&bounds, 10.0, QueryMode::Coverage)
            .unwrap();

        assert_eq!(results[0].name, "big");
    }

    #[test]
    fn recency_lets_a_newer_lower_priority_source_outrank_an_older_one() {
        let mut catalog = MemoryCatalog::new();
        // Identical footprint and resolution, so overzoom/underzoom
        // penalties and new-area are a wash between the two; only
        // priority and recency can separate them. "older" wins on
        // priority alone (2.0 vs 1.9, a 1.0-point gap once scaled by
        // *10.0), but "newer" is the most recent source in the corpus
        // while "older" is the oldest, so the recency term's full 5.0
        // swing should flip the ranking.
        catalog.add_source(
            square(-1.0, -1.0, 1.0, 1.0),
            source_acquired("older", "u1", 2.0, 10.0, Some("2010-01-01")),
        );
        catalog.add_source(
            square(-1.0, -1.0, 1.0, 1.0),
            source_acquired("newer", "u2", 1.9, 10.0, Some("2024-01-01")),
        );

        let bounds = Bounds::new(-0.5, -0.5, 0.5, 0.5, crate::geometry::Crs::Wgs84);
        let results = catalog
            .get_sources(&bounds, 10.0, QueryMode::Coverage)
            .unwrap();

        assert_eq!(results[0].name, "newer");
    }

    #[test]
    fn acquired_at_ordinal_parses_iso_date_prefix() {
        let a = acquired_at_ordinal(&Some("2020-01-01".to_string())).unwrap();
        let b = acquired_at_ordinal(&Some("2021-01-01".to_string())).unwrap();
        assert!(b > a);
        assert!(acquired_at_ordinal(&None).is_none());
        assert!(acquired_at_ordinal(&Some("not-a-date".to_string())).is_none());
    }
}
