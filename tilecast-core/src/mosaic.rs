//! The multi-source mosaic compositor (§4.5): fan out reads across a
//! bounded thread pool, consume results in catalog order, paste each
//! window onto a canvas, and stop once the canvas is fully opaque.

use geo::{coord, Contains, LineString, MultiPolygon, Polygon};
use rayon::prelude::*;
use tracing::{instrument, warn};

use crate::catalog::{recipes, RecipeDirective, Source};
use crate::error::{RenderError, RenderResult};
use crate::geometry::{self, Bounds};
use crate::pixels::PixelCollection;
use crate::raster::{read_window, HandleCache, Resample};

#[derive(Debug)]
pub struct MosaicResult {
    /// Sources actually pasted onto the canvas, in the order they were
    /// consumed (catalog order, skipping any that failed to read or that
    /// arrived after the canvas was already fully opaque).
    pub sources_used: Vec<Source>,
    pub canvas: PixelCollection,
}

/// Composites `sources` (already catalog-ordered) into a single raster
/// over `target_bounds`/`target_shape`.
#[instrument(skip(sources, handle_cache), fields(n_sources = sources.len()))]
pub fn composite(
    sources: Vec<Source>,
    target_bounds: &Bounds,
    target_shape: (u32, u32),
) -> RenderResult<MosaicResult> {
    let handle_cache = HandleCache::new(256);
    composite_with_cache(sources, target_bounds, target_shape, &handle_cache)
}

pub fn composite_with_cache(
    sources: Vec<Source>,
    target_bounds: &Bounds,
    target_shape: (u32, u32),
    handle_cache: &HandleCache,
) -> RenderResult<MosaicResult> {
    let landsat8_scenes = recipes::landsat8_scene_count(&sources);
    let has_landsat8_pan = sources
        .iter()
        .any(|s| s.recipes.contains_key("landsat8") && s.band_info.contains_key("pan"));
    let sources = recipes::preprocess(sources);

    let canvas_bands = sources
        .iter()
        .filter_map(|s| s.band)
        .map(|b| b + 1)
        .max()
        .unwrap_or(1);

    let mut canvas = PixelCollection::empty_canvas(
        canvas_bands,
        target_shape.0 as usize,
        target_shape.1 as usize,
        *target_bounds,
    );

    // Fan out: each source's read + per-source recipe application runs
    // independently; rayon's `par_iter` bounds concurrency to the global
    // thread pool rather than spawning one task per source unconditionally.
    let results: Vec<Option<(Source, PixelCollection)>> = sources
        .par_iter()
        .map(|source| match read_one(source, target_bounds, target_shape, handle_cache) {
            Ok(pixels) => Some((source.clone(), pixels)),
            Err(err) => {
                warn!(url = %source.url, error = %err, "source read failed, skipping");
                None
            }
        })
        .collect();

    let mut sources_used = Vec::new();

    // Consume in submission (catalog) order, not completion order, so
    // priority/coverage semantics are preserved even though reads ran
    // concurrently.
    for result in results {
        if canvas.is_fully_opaque() {
            break;
        }
        let Some((source, window)) = result else {
            continue;
        };
        paste(&mut canvas, &window, source.band)?;
        sources_used.push(source);
    }

    // Brovey-pansharpen split-band Landsat-8 scenes (each scene's r/g/b/pan
    // pasted into its own 4-band block above) into the final 3-band RGB
    // output, one scene at a time so overlapping scenes never mix bands.
    let canvas = if has_landsat8_pan && canvas.bands() == landsat8_scenes * 4 {
        recipes::pansharpen_brovey_scenes(canvas, landsat8_scenes)
    } else {
        canvas
    };

    Ok(MosaicResult { sources_used, canvas })
}

fn read_one(
    source: &Source,
    target_bounds: &Bounds,
    target_shape: (u32, u32),
    handle_cache: &HandleCache,
) -> RenderResult<PixelCollection> {
    let directives = recipes::parse_directives(source);
    let resample = directives
        .iter()
        .find_map(|d| match d {
            RecipeDirective::Resample(mode) => Some(parse_resample(mode)),
            _ => None,
        })
        .unwrap_or(Resample::Bilinear);

    let handle = handle_cache
        .get_or_open(&source.url)
        .map_err(|err| RenderError::data_read_failed(source.url.clone(), std::io::Error::other(err.to_string())))?;

    let mut pixels = read_window(&handle, &source.url, target_bounds, target_shape, resample)?;
    if let Some(mask_geojson) = &source.mask {
        apply_polygon_mask(&mut pixels, mask_geojson);
    }
    recipes::apply(&directives, pixels, source)
}

/// Parses a GeoJSON `Polygon`/`MultiPolygon`'s `coordinates` into a
/// `geo::MultiPolygon`. No attempt is made to support other geometry
/// types or CRS metadata: `Source.mask` is defined as a WGS84 clip, same
/// as the catalog's own footprint convention.
fn parse_mask_geometry(value: &serde_json::Value) -> Option<MultiPolygon<f64>> {
    let ring_from_coords = |coords: &serde_json::Value| -> Option<LineString<f64>> {
        let points = coords.as_array()?;
        let coords = points
            .iter()
            .map(|p| {
                let p = p.as_array()?;
                Some(coord! { x: p.first()?.as_f64()?, y: p.get(1)?.as_f64()? })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(LineString::new(coords))
    };

    let polygon_from_rings = |rings: &serde_json::Value| -> Option<Polygon<f64>> {
        let rings = rings.as_array()?;
        let exterior = ring_from_coords(rings.first()?)?;
        let interiors = rings
            .iter()
            .skip(1)
            .map(ring_from_coords)
            .collect::<Option<Vec<_>>>()?;
        Some(Polygon::new(exterior, interiors))
    };

    let geom_type = value.get("type")?.as_str()?;
    let coordinates = value.get("coordinates")?;
    match geom_type {
        "Polygon" => Some(MultiPolygon::new(vec![polygon_from_rings(coordinates)?])),
        "MultiPolygon" => {
            let polygons = coordinates
                .as_array()?
                .iter()
                .map(polygon_from_rings)
                .collect::<Option<Vec<_>>>()?;
            Some(MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

/// Intersects `pixels.mask` with the source's polygon clip (§3's
/// `Source.mask`): pixels whose center falls outside the polygon are
/// masked out, regardless of what the raster read itself found valid.
fn apply_polygon_mask(pixels: &mut PixelCollection, mask_geojson: &serde_json::Value) {
    let Some(polygon) = parse_mask_geometry(mask_geojson) else {
        warn!("source mask geometry could not be parsed, ignoring it");
        return;
    };

    let bounds = pixels.bounds;
    let (height, width) = (pixels.height(), pixels.width());
    let px = bounds.width() / width as f64;
    let py = bounds.height() / height as f64;

    for row in 0..height {
        for col in 0..width {
            if pixels.mask[[row, col]] {
                continue;
            }
            let x = bounds.minx + (col as f64 + 0.5) * px;
            let y = bounds.maxy - (row as f64 + 0.5) * py;
            let (lon, lat) = geometry::to_wgs84(x, y, bounds.crs);
            if !polygon.contains(&coord! { x: lon, y: lat }) {
                pixels.mask[[row, col]] = true;
            }
        }
    }
}

fn parse_resample(mode: &str) -> Resample {
    match mode {
        "nearest" => Resample::Nearest,
        "cubic_spline" | "cubicspline" => Resample::CubicSpline,
        _ => Resample::Bilinear,
    }
}

/// Pastes `window` onto `canvas`. Bounds/CRS/shape mismatches are
/// programmer errors (§4.5) and fail fast with `InternalInvariant`.
fn paste(canvas: &mut PixelCollection, window: &PixelCollection, band: Option<usize>) -> RenderResult<()> {
    if canvas.bounds.crs != window.bounds.crs {
        return Err(RenderError::InternalInvariant(
            "paste: canvas and window CRS differ".into(),
        ));
    }
    if canvas.height() != window.height() || canvas.width() != window.width() {
        return Err(RenderError::InternalInvariant(
            "paste: canvas and window shape differ".into(),
        ));
    }
    const EPS: f64 = 1e-9;
    let (cb, wb) = (canvas.bounds, window.bounds);
    if (cb.minx - wb.minx).abs() > EPS
        || (cb.miny - wb.miny).abs() > EPS
        || (cb.maxx - wb.maxx).abs() > EPS
        || (cb.maxy - wb.maxy).abs() > EPS
    {
        return Err(RenderError::InternalInvariant(
            "paste: canvas and window bounds differ".into(),
        ));
    }

    let (height, width) = (canvas.height(), canvas.width());
    for row in 0..height {
        for col in 0..width {
            let canvas_masked = canvas.mask[[row, col]];
            let window_valid = !window.mask[[row, col]];

            if canvas_masked && window_valid {
                match band {
                    Some(b) => canvas.data[[b, row, col]] = window.data[[0, row, col]],
                    None => {
                        let shared_bands = canvas.bands().min(window.bands());
                        for b in 0..shared_bands {
                            canvas.data[[b, row, col]] = window.data[[b, row, col]];
                        }
                    }
                }
            }

            canvas.mask[[row, col]] = canvas_masked && window.mask[[row, col]];
        }
    }

    Ok(())
}
