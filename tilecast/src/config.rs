//! Wires a loaded [`tilecast_core::config::Config`] to a concrete
//! [`Catalog`] implementation. Only the in-memory fixture backend is
//! constructable from this crate — a relational-spatial catalog is a trait
//! object by design (§4.3) and its construction is left to an embedder that
//! links a Postgres client.

use std::fs;
use std::path::Path;

use geo::{coord, LineString, Polygon};
use serde::Deserialize;
use tilecast_core::catalog::{Catalog, MemoryCatalog, Source};
use tilecast_core::config::CatalogBackend;

use crate::error::{CliError, CliResult};

/// One entry in a sources fixture file: a [`Source`] record plus the
/// footprint polygon (a single ring, WGS84 lon/lat pairs) `MemoryCatalog`
/// needs but `Source` itself doesn't carry as a typed geometry.
#[derive(Debug, Deserialize)]
struct SourceFixtureEntry {
    #[serde(flatten)]
    source: Source,
    footprint: Vec<(f64, f64)>,
}

fn polygon_from_ring(ring: &[(f64, f64)]) -> Polygon<f64> {
    Polygon::new(
        LineString::new(ring.iter().map(|&(x, y)| coord! { x: x, y: y }).collect()),
        vec![],
    )
}

/// Parses a sources fixture (JSON array of [`SourceFixtureEntry`]) into a
/// fresh `MemoryCatalog`.
pub fn catalog_from_json_str(raw: &str) -> CliResult<MemoryCatalog> {
    let entries: Vec<SourceFixtureEntry> =
        serde_json::from_str(raw).map_err(|err| CliError::CatalogLoad(format!("parsing sources fixture: {err}")))?;

    let mut catalog = MemoryCatalog::new();
    for entry in entries {
        catalog.add_source(polygon_from_ring(&entry.footprint), entry.source);
    }
    Ok(catalog)
}

/// Loads a sources fixture file into a fresh `MemoryCatalog`.
pub fn load_memory_catalog(sources_path: &Path) -> CliResult<MemoryCatalog> {
    let raw = fs::read_to_string(sources_path)
        .map_err(|err| CliError::CatalogLoad(format!("reading {}: {err}", sources_path.display())))?;
    catalog_from_json_str(&raw)
}

/// Builds the catalog named by `backend`, relative to `base_dir` for any
/// file paths the backend config carries.
pub fn build_catalog(backend: &CatalogBackend, base_dir: &Path) -> CliResult<Box<dyn Catalog>> {
    match backend {
        CatalogBackend::Memory { sources_path } => {
            let path = base_dir.join(sources_path);
            Ok(Box::new(load_memory_catalog(&path)?))
        }
        CatalogBackend::Postgres { .. } => Err(CliError::CatalogLoad(
            "a Postgres-backed catalog requires an embedder that links a SQL driver; \
             the CLI binary only supports the in-memory fixture backend"
                .to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecast_core::catalog::QueryMode;
    use tilecast_core::geometry::{Bounds, Crs};

    #[test]
    fn parses_a_fixture_and_queries_it() {
        let raw = r#"[
            {
                "url": "s3://bucket/a.tif",
                "name": "a",
                "resolution": 10.0,
                "priority": 1.0,
                "coverage": 1.0,
                "min_zoom": 0,
                "max_zoom": 22,
                "footprint": [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0], [-1.0, -1.0]]
            }
        ]"#;

        let catalog = catalog_from_json_str(raw).unwrap();
        let bounds = Bounds::new(-0.5, -0.5, 0.5, 0.5, Crs::Wgs84);
        let sources = catalog
            .get_sources(&bounds, 10.0, QueryMode::Range { min_zoom: 0, max_zoom: 22 })
            .unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "a");
    }

    #[test]
    fn rejects_malformed_fixture_json() {
        assert!(catalog_from_json_str("not json").is_err());
    }

    #[test]
    fn postgres_backend_is_rejected_by_this_cli() {
        let backend = CatalogBackend::Postgres {
            connection_string: "postgres://localhost/db".to_string(),
        };
        assert!(build_catalog(&backend, Path::new(".")).is_err());
    }
}
