//! The top-level render orchestrator (§4.8), grounded on the
//! predecessor's `marblecutter.render()`: expand for a transformation's
//! buffer, query the catalog (or use an explicit source list), composite,
//! transform, crop, encode, and collect per-stage timings.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::instrument;

use crate::catalog::{Catalog, QueryMode, Source};
use crate::error::{RenderError, RenderResult};
use crate::format::Format;
use crate::geometry::{resolution_in_meters, Bounds, Crs};
use crate::mosaic::composite_with_cache;
use crate::raster::HandleCache;
use crate::tile::{RenderedTile, StageTiming};
use crate::transform::{CropOffsets, DataFormat, Transformation};

/// Either an explicit source list (caller already knows what to
/// composite) or a catalog to query — §4.8 step 1 rejects a render with
/// neither.
#[derive(Debug)]
pub enum SourceInput<'a> {
    Catalog(&'a dyn Catalog),
    Sources(Vec<Source>),
}

/// Renders `bounds`/`shape` (in `target_crs`) through an optional
/// transformation and the given format. `expand` gates whether a
/// transformation's buffer is actually applied (§4.8 step 2) — callers
/// that already pre-buffered their bounds pass `false`.
#[instrument(skip(format, input, transformation, handle_cache), fields(width = shape.1, height = shape.0))]
#[allow(clippy::too_many_arguments)]
pub fn render(
    bounds: Bounds,
    shape: (u32, u32),
    target_crs: Crs,
    format: &dyn Format,
    expand: bool,
    input: SourceInput<'_>,
    transformation: Option<&dyn Transformation>,
    handle_cache: &HandleCache,
    query_mode: Option<QueryMode>,
) -> RenderResult<RenderedTile> {
    let mut timings = Vec::new();

    let (render_bounds, render_shape, offsets) = if expand {
        match transformation {
            Some(t) => t.expand(bounds, shape),
            None => (bounds, shape, CropOffsets::default()),
        }
    } else {
        (bounds, shape, CropOffsets::default())
    };

    let sources = match input {
        SourceInput::Sources(sources) => sources,
        SourceInput::Catalog(catalog) => {
            let started = Instant::now();
            let (dx, dy) = resolution_in_meters(&render_bounds, render_shape.0, render_shape.1);
            let resolution_m = dx.max(dy);
            // Coverage is the default query mode (spec.md:5,66): a
            // greedy cover picks the fewest, best-scoring sources needed
            // to fill the tile. Range is available as an explicit opt-in
            // for callers that want every candidate in a zoom band
            // instead (e.g. a future mosaic-preview tool).
            let mode = query_mode.unwrap_or(QueryMode::Coverage);
            let sources = catalog.get_sources(&render_bounds, resolution_m, mode)?;
            timings.push(StageTiming {
                stage: "catalog",
                duration: started.elapsed(),
            });
            if sources.is_empty() {
                return Err(RenderError::NoDataAvailable);
            }
            sources
        }
    };

    let started = Instant::now();
    let mosaic = composite_with_cache(sources, &render_bounds, render_shape, handle_cache)?;
    timings.push(StageTiming {
        stage: "composite",
        duration: started.elapsed(),
    });

    if mosaic.canvas.unmasked_count() == 0 {
        return Err(RenderError::NoDataAvailable);
    }

    let started = Instant::now();
    let (pixels, data_format) = match transformation {
        Some(t) => {
            let (transformed, data_format) = t.transform(mosaic.canvas)?;
            (t.postprocess(transformed, data_format, offsets), data_format)
        }
        None => (mosaic.canvas, DataFormat::Raw),
    };
    timings.push(StageTiming {
        stage: "transform",
        duration: started.elapsed(),
    });

    let started = Instant::now();
    let (bytes, content_type) = format.encode(&pixels, data_format)?;
    timings.push(StageTiming {
        stage: "encode",
        duration: started.elapsed(),
    });

    Ok(build_tile(content_type, bytes, mosaic.sources_used, timings))
}

fn build_tile(
    content_type: &'static str,
    bytes: Vec<u8>,
    sources_used: Vec<Source>,
    timings: Vec<StageTiming>,
) -> RenderedTile {
    let mut headers = BTreeMap::new();
    headers.insert("Content-Type".to_string(), content_type.to_string());

    let acquired_at: Vec<&str> = sources_used
        .iter()
        .filter_map(|s| s.acquired_at.as_deref())
        .collect();
    if !acquired_at.is_empty() {
        headers.insert("X-Acquired-At".to_string(), acquired_at.join(", "));
    }
    for (field, header) in [("provider", "X-Provider"), ("platform", "X-Platform")] {
        let values: Vec<&str> = sources_used
            .iter()
            .filter_map(|s| s.meta.get(field).and_then(|v| v.as_str()))
            .collect();
        if !values.is_empty() {
            headers.insert(header.to_string(), values.join(", "));
        }
    }

    let names = sources_used
        .iter()
        .map(|s| format!("{} - {}", s.name, s.url))
        .collect();

    let mut tile = RenderedTile {
        content_type,
        bytes,
        sources_used: names,
        timings,
        headers,
    };
    tile.headers
        .insert("Server-Timing".to_string(), tile.server_timing());
    tile
}

/// `(z, x, y)` tile request with optional `scale` (§6): validates against
/// the catalog's declared bounds/zoom, maps to Web Mercator bounds at
/// `scale·256` resolution, and renders.
#[allow(clippy::too_many_arguments)]
pub fn render_tile(
    z: u8,
    x: u32,
    y: u32,
    catalog: &dyn Catalog,
    transformation: Option<&dyn Transformation>,
    format: &dyn Format,
    scale: u32,
    expand: bool,
    handle_cache: &HandleCache,
    query_mode: Option<QueryMode>,
) -> RenderResult<RenderedTile> {
    crate::geometry::validate_tile(z, x, y)?;

    let [minx, miny, maxx, maxy] = tilecast_tile_utils::xyz_to_mercator_bbox(z, x, y);
    let bounds = Bounds::new(minx, miny, maxx, maxy, Crs::WebMercator);
    catalog.validate(z, x, y, &bounds)?;

    let side = 256 * scale;
    render(
        bounds,
        (side, side),
        Crs::WebMercator,
        format,
        expand,
        SourceInput::Catalog(catalog),
        transformation,
        handle_cache,
        query_mode,
    )
}

/// Pixel size of one SRTM1 `.hgt` sample, in degrees (one arc-second).
const SKADI_PIXEL_SIZE: f64 = 1.0 / 3600.0;
const SKADI_SAMPLES: u32 = 3601;

/// Parses a Skadi tile name (`^[NS]\d{2}[EW]\d{3}$`, e.g. `N38W123`) into
/// its south-west corner `(lon, lat)`.
fn parse_skadi_name(name: &str) -> RenderResult<(f64, f64)> {
    let bytes = name.as_bytes();
    let invalid = || RenderError::InvalidTileRequest(format!("malformed skadi tile name: {name}"));

    if bytes.len() != 7 {
        return Err(invalid());
    }

    let ns = match bytes[0] {
        b'N' => 1.0,
        b'S' => -1.0,
        _ => return Err(invalid()),
    };
    let lat_digits = name.get(1..3).ok_or_else(invalid)?;
    let lat: f64 = lat_digits.parse().map_err(|_| invalid())?;

    let ew = match bytes[3] {
        b'E' => 1.0,
        b'W' => -1.0,
        _ => return Err(invalid()),
    };
    let lon_digits = name.get(4..7).ok_or_else(invalid)?;
    let lon: f64 = lon_digits.parse().map_err(|_| invalid())?;

    Ok((ew * lon, ns * lat))
}

/// Converts a Skadi tile name to a 1°×1° WGS84 bounds at 3601×3601,
/// padded by a half-arc-second fringe on every side so the pixel grid's
/// *centers* land exactly on the integer-degree corners shared with
/// neighboring tiles, per the SRTMHGT point-grid convention.
pub fn render_skadi(
    name: &str,
    catalog: &dyn Catalog,
    format: &dyn Format,
    handle_cache: &HandleCache,
) -> RenderResult<RenderedTile> {
    let (lon, lat) = parse_skadi_name(name)?;
    let fringe = SKADI_PIXEL_SIZE / 2.0;
    let bounds = Bounds::new(lon - fringe, lat - fringe, lon + 1.0 + fringe, lat + 1.0 + fringe, Crs::Wgs84);

    // Skadi tiles aren't keyed by Web Mercator zoom, so this checks bounds
    // overlap only rather than reusing `Catalog::validate`'s zoom bound.
    let catalog_bounds = catalog.bounds();
    let disjoint = bounds.maxx < catalog_bounds.minx
        || bounds.minx > catalog_bounds.maxx
        || bounds.maxy < catalog_bounds.miny
        || bounds.miny > catalog_bounds.maxy;
    if disjoint {
        return Err(RenderError::InvalidTileRequest(format!(
            "skadi tile {name} falls outside the catalog's declared bounds"
        )));
    }

    render(
        bounds,
        (SKADI_SAMPLES, SKADI_SAMPLES),
        Crs::Wgs84,
        format,
        false,
        SourceInput::Catalog(catalog),
        None,
        handle_cache,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_skadi_tile_names() {
        assert_eq!(parse_skadi_name("N38W123").unwrap(), (-123.0, 38.0));
        assert_eq!(parse_skadi_name("S34E018").unwrap(), (18.0, -34.0));
    }

    #[test]
    fn rejects_malformed_skadi_names() {
        assert!(parse_skadi_name("X38W123").is_err());
        assert!(parse_skadi_name("N3W123").is_err());
        assert!(parse_skadi_name("").is_err());
    }

    /// Writes a constant-value single-band `/vsimem/` GeoTIFF so the
    /// catalog-driven tests below have something real for `read_window`
    /// to warp and read, rather than mocking the raster layer.
    fn write_test_raster(path: &str, bounds: Bounds, size: (usize, usize), value: f32) {
        use gdal::cpl::CslStringList;
        use gdal::raster::Buffer;
        use gdal::spatial_ref::SpatialRef;
        use gdal::Driver;

        let (width, height) = size;
        let driver = Driver::get_by_name("GTiff").unwrap();
        let options = CslStringList::new();
        {
            let mut dataset = driver
                .create_with_band_type_with_options::<f32>(path, width, height, 1, &options)
                .unwrap();

            let dx = (bounds.maxx - bounds.minx) / width as f64;
            let dy = (bounds.maxy - bounds.miny) / height as f64;
            dataset
                .set_geo_transform(&[bounds.minx, dx, 0.0, bounds.maxy, 0.0, -dy])
                .unwrap();
            let srs = SpatialRef::from_epsg(bounds.crs.epsg()).unwrap();
            dataset.set_spatial_ref(&srs).unwrap();

            let mut band = dataset.rasterband(1).unwrap();
            let buffer = Buffer::new((width, height), vec![value; width * height]);
            band.write((0, 0), (width, height), &buffer).unwrap();
        }
    }

    fn wgs84_square(minx: f64, miny: f64, maxx: f64, maxy: f64) -> geo::Polygon<f64> {
        use geo::{coord, LineString, Polygon};
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

    fn test_source(url: &str, name: &str, priority: f64, resolution: f64) -> Source {
        Source {
            url: url.to_string(),
            name: name.to_string(),
            resolution,
            band_info: Default::default(),
            meta: serde_json::Value::Null,
            recipes: Default::default(),
            acquired_at: None,
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

    /// A higher-priority, finer source covers only the left half of the
    /// requested tile; a lower-priority, coarser source covers the whole
    /// tile. The default (Coverage) query mode must pick both — the
    /// finer one for the area it covers, the coarser one to fill the
    /// rest — rather than stopping after the single highest-priority
    /// source the way a naive "best match" query would.
    #[test]
    fn coverage_mode_composites_overlapping_multi_resolution_sources() {
        use crate::catalog::MemoryCatalog;
        use crate::geometry::Crs;

        let left_half = Bounds::new(0.0, 0.0, 1.0, 2.0, Crs::Wgs84);
        let full_tile = Bounds::new(0.0, 0.0, 2.0, 2.0, Crs::Wgs84);

        let fine_path = "/vsimem/render-test-fine.tif";
        let coarse_path = "/vsimem/render-test-coarse.tif";
        write_test_raster(fine_path, left_half, (2, 2), 10.0);
        write_test_raster(coarse_path, full_tile, (2, 2), 20.0);

        let mut catalog = MemoryCatalog::new();
        catalog.add_source(
            wgs84_square(0.0, 0.0, 1.0, 2.0),
            test_source(fine_path, "fine", 5.0, 1.0),
        );
        catalog.add_source(
            wgs84_square(0.0, 0.0, 2.0, 2.0),
            test_source(coarse_path, "coarse", 1.0, 5.0),
        );

        let format = crate::format::GeoTiff;
        let handle_cache = HandleCache::new(16);

        let tile = render(
            full_tile,
            (4, 4),
            Crs::Wgs84,
            &format,
            false,
            SourceInput::Catalog(&catalog),
            None,
            &handle_cache,
            None,
        )
        .unwrap();

        assert_eq!(tile.sources_used.len(), 2);
        assert!(tile.sources_used.iter().any(|s| s.contains("fine")));
        assert!(tile.sources_used.iter().any(|s| s.contains("coarse")));
    }

    /// The explicit `Range` opt-in, by contrast, returns every candidate
    /// in the zoom band regardless of whether it's actually needed to
    /// cover the tile — both sources come back even though the fine one
    /// alone wouldn't satisfy coverage.
    #[test]
    fn range_mode_is_available_as_explicit_opt_in() {
        use crate::catalog::{MemoryCatalog, QueryMode};
        use crate::geometry::Crs;

        let left_half = Bounds::new(0.0, 0.0, 1.0, 2.0, Crs::Wgs84);
        let full_tile = Bounds::new(0.0, 0.0, 2.0, 2.0, Crs::Wgs84);

        let fine_path = "/vsimem/render-test-range-fine.tif";
        let coarse_path = "/vsimem/render-test-range-coarse.tif";
        write_test_raster(fine_path, left_half, (2, 2), 10.0);
        write_test_raster(coarse_path, full_tile, (2, 2), 20.0);

        let mut catalog = MemoryCatalog::new();
        catalog.add_source(
            wgs84_square(0.0, 0.0, 1.0, 2.0),
            test_source(fine_path, "fine", 5.0, 1.0),
        );
        catalog.add_source(
            wgs84_square(0.0, 0.0, 2.0, 2.0),
            test_source(coarse_path, "coarse", 1.0, 5.0),
        );

        let format = crate::format::GeoTiff;
        let handle_cache = HandleCache::new(16);

        let tile = render(
            full_tile,
            (4, 4),
            Crs::Wgs84,
            &format,
            false,
            SourceInput::Catalog(&catalog),
            None,
            &handle_cache,
            Some(QueryMode::Range { min_zoom: 0, max_zoom: 22 }),
        )
        .unwrap();

        assert_eq!(tile.sources_used.len(), 2);
    }
}
