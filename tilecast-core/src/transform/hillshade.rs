//! Classical shaded-relief over a single-band DEM. Ported from the
//! predecessor's `transformations/hillshade.py`: a matplotlib-derived
//! illumination model, a zoom-indexed vertical-exaggeration table, and a
//! Paterson-chart downsample/upsample pass at mid zooms to get the
//! generalized look real hillshade products have at those scales.

use ndarray::Array2;

use crate::error::{RenderError, RenderResult};
use crate::geometry::{resolution_in_meters, zoom_for_resolution, RoundOp};
use crate::pixels::PixelCollection;
use crate::raster::Resample;

use super::{latitude_scale_factors, DataFormat, Transformation};

const AZIMUTH_DEG: f64 = 315.0;
const ALTITUDE_DEG: f64 = 45.0;

/// From shadedrelief.com/web_relief: vertical exaggeration indexed by
/// zoom, heaviest at low zoom where elevation differences are otherwise
/// imperceptible relative to the ground footprint of a tile.
const EXAGGERATION: [(u8, f64); 15] = [
    (0, 45.0),
    (1, 29.0),
    (2, 20.0),
    (3, 14.0),
    (4, 9.5),
    (5, 6.5),
    (6, 5.0),
    (7, 3.6),
    (8, 2.7),
    (9, 2.1),
    (10, 1.7),
    (11, 1.4),
    (12, 1.3),
    (13, 1.2),
    (14, 1.1),
];

/// Tom Paterson's chart: the fraction to downsample to before shading,
/// then upsample back, at zooms where a generalized (rather than
/// per-pixel) hillshade reads better.
const PATERSON_RESAMPLE: [(u8, f64); 9] = [
    (5, 0.9),
    (6, 0.8),
    (7, 0.8),
    (8, 0.7),
    (9, 0.7),
    (10, 0.7),
    (11, 0.8),
    (12, 0.8),
    (13, 0.9),
];

fn exaggeration_for(zoom: u8) -> f64 {
    EXAGGERATION.iter().find(|(z, _)| *z == zoom).map(|(_, v)| *v).unwrap_or(1.0)
}

fn resample_factor_for(zoom: u8) -> f64 {
    PATERSON_RESAMPLE.iter().find(|(z, _)| *z == zoom).map(|(_, v)| *v).unwrap_or(1.0)
}

#[derive(Debug, Clone, Copy)]
pub struct Hillshade {
    pub resample: bool,
    pub add_slopeshade: bool,
}

impl Default for Hillshade {
    fn default() -> Self {
        Self {
            resample: true,
            add_slopeshade: true,
        }
    }
}

impl Transformation for Hillshade {
    fn buffer(&self) -> usize {
        4
    }

    fn transform(&self, pixels: PixelCollection) -> RenderResult<(PixelCollection, DataFormat)> {
        if pixels.bands() != 1 {
            return Err(RenderError::InvalidTileRequest(
                "hillshade requires a single-band source".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let (dx, dy) = resolution_in_meters(&pixels.bounds, height as u32, width as u32);
        let zoom = zoom_for_resolution(dx.max(dy), RoundOp::Round);
        let exaggeration = exaggeration_for(zoom);

        let scales = latitude_scale_factors(&pixels.bounds, height);
        let mut elevation = Array2::<f64>::zeros((height, width));
        for row in 0..height {
            for col in 0..width {
                elevation[[row, col]] = f64::from(pixels.data[[0, row, col]]) * scales[row];
            }
        }

        let factor = if self.resample { resample_factor_for(zoom) } else { 1.0 };
        let shaded = if (factor - 1.0).abs() > f64::EPSILON {
            shade_at_scale(&elevation, dx, dy, exaggeration, self.add_slopeshade, factor)?
        } else {
            shade(&elevation, dx, -dy, exaggeration, self.add_slopeshade)
        };

        let mut data = ndarray::Array3::<f32>::zeros((1, height, width));
        for row in 0..height {
            for col in 0..width {
                data[[0, row, col]] = (255.0 * shaded[[row, col]]).clamp(0.0, 255.0) as f32;
            }
        }

        Ok((
            PixelCollection::new(data, pixels.mask, pixels.bounds),
            DataFormat::Raw,
        ))
    }
}

/// Downsamples `elevation` by `factor`, shades at the coarser scale, then
/// upsamples back — the "resample according to Tom Paterson's chart" step.
/// GDAL's own `RasterIO` resampling does the down/up-sampling so this
/// doesn't need a hand-rolled 2D interpolation.
fn shade_at_scale(
    elevation: &Array2<f64>,
    dx: f64,
    dy: f64,
    exaggeration: f64,
    add_slopeshade: bool,
    factor: f64,
) -> RenderResult<Array2<f64>> {
    let (height, width) = elevation.dim();
    let small_h = ((height as f64) * factor).round().max(1.0) as usize;
    let small_w = ((width as f64) * factor).round().max(1.0) as usize;

    let small = resample_2d(elevation, small_h, small_w, Resample::Bilinear);
    let small_shaded = shade(&small, dx, -dy, exaggeration, add_slopeshade);
    Ok(resample_2d(&small_shaded, height, width, Resample::Bilinear))
}

/// Nearest/bilinear box resampling of a plain `f64` grid. Used only for
/// the hillshade generalization pass, which operates on an elevation
/// field already pulled out of its masked `PixelCollection`.
fn resample_2d(src: &Array2<f64>, out_h: usize, out_w: usize, mode: Resample) -> Array2<f64> {
    let (in_h, in_w) = src.dim();
    let mut out = Array2::<f64>::zeros((out_h, out_w));
    for row in 0..out_h {
        let sy = (row as f64 + 0.5) * in_h as f64 / out_h as f64 - 0.5;
        for col in 0..out_w {
            let sx = (col as f64 + 0.5) * in_w as f64 / out_w as f64 - 0.5;
            out[[row, col]] = match mode {
                Resample::Nearest => {
                    let ry = sy.round().clamp(0.0, in_h as f64 - 1.0) as usize;
                    let rx = sx.round().clamp(0.0, in_w as f64 - 1.0) as usize;
                    src[[ry, rx]]
                }
                _ => bilinear_sample(src, sx, sy),
            };
        }
    }
    out
}

fn bilinear_sample(src: &Array2<f64>, x: f64, y: f64) -> f64 {
    let (h, w) = src.dim();
    let x0 = x.floor().clamp(0.0, w as f64 - 1.0) as usize;
    let y0 = y.floor().clamp(0.0, h as f64 - 1.0) as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = (x - x0 as f64).clamp(0.0, 1.0);
    let ty = (y - y0 as f64).clamp(0.0, 1.0);

    let top = src[[y0, x0]] * (1.0 - tx) + src[[y0, x1]] * tx;
    let bottom = src[[y1, x0]] * (1.0 - tx) + src[[y1, x1]] * tx;
    top * (1.0 - ty) + bottom * ty
}

/// Matplotlib's `LightSource.hillshade`, stripped of its contrast
/// stretch (which would use local, per-tile min/max and break tile
/// seams). `dy` is pre-negated by the caller to match `np.gradient`'s
/// row-major orientation.
fn shade(elevation: &Array2<f64>, dx: f64, dy: f64, vert_exag: f64, add_slopeshade: bool) -> Array2<f64> {
    let az = (90.0 - AZIMUTH_DEG).to_radians();
    let alt = ALTITUDE_DEG.to_radians();

    let (grad_y, grad_x) = gradient(elevation, vert_exag, dy, dx);
    let (height, width) = elevation.dim();
    let mut out = Array2::<f64>::zeros((height, width));

    for row in 0..height {
        for col in 0..width {
            let gx = grad_x[[row, col]];
            let gy = grad_y[[row, col]];
            let aspect = (-gy).atan2(-gx);
            let slope = std::f64::consts::FRAC_PI_2 - gx.hypot(gy).atan();
            let mut intensity = alt.sin() * slope.sin() + alt.cos() * slope.cos() * (az - aspect).cos();
            if add_slopeshade {
                intensity *= slope_shade(slope);
            }
            out[[row, col]] = intensity.clamp(0.0, 1.0);
        }
    }
    out
}

fn slope_shade(slope: f64) -> f64 {
    slope * (1.0 / std::f64::consts::FRAC_PI_2)
}

/// `np.gradient` over a 2D array with explicit row/col spacing: central
/// differences in the interior, one-sided at the edges.
fn gradient(field: &Array2<f64>, scale: f64, dy: f64, dx: f64) -> (Array2<f64>, Array2<f64>) {
    let (height, width) = field.dim();
    let mut grad_y = Array2::<f64>::zeros((height, width));
    let mut grad_x = Array2::<f64>::zeros((height, width));

    for row in 0..height {
        for col in 0..width {
            let v = scale * field[[row, col]];

            let dvdy = if height < 2 {
                0.0
            } else if row == 0 {
                (scale * field[[1, col]] - v) / dy
            } else if row == height - 1 {
                (v - scale * field[[height - 2, col]]) / dy
            } else {
                (scale * field[[row + 1, col]] - scale * field[[row - 1, col]]) / (2.0 * dy)
            };

            let dvdx = if width < 2 {
                0.0
            } else if col == 0 {
                (scale * field[[row, 1]] - v) / dx
            } else if col == width - 1 {
                (v - scale * field[[row, width - 2]]) / dx
            } else {
                (scale * field[[row, col + 1]] - scale * field[[row, col - 1]]) / (2.0 * dx)
            };

            grad_y[[row, col]] = dvdy;
            grad_x[[row, col]] = dvdx;
        }
    }

    (grad_y, grad_x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};

    #[test]
    fn flat_elevation_is_uniformly_lit() {
        let elevation = Array2::<f64>::zeros((8, 8));
        let shaded = shade(&elevation, 10.0, -10.0, 1.0, false);
        let first = shaded[[0, 0]];
        assert!(shaded.iter().all(|&v| (v - first).abs() < 1e-9));
    }

    #[test]
    fn hillshade_output_is_single_band_u8_range() {
        let bounds = Bounds::new(0.0, 0.0, 1000.0, 1000.0, Crs::WebMercator);
        let mut pixels = PixelCollection::empty_canvas(1, 16, 16, bounds);
        pixels.mask.fill(false);
        for row in 0..16 {
            for col in 0..16 {
                pixels.data[[0, row, col]] = (row * 16 + col) as f32;
            }
        }

        let transform = Hillshade {
            resample: false,
            add_slopeshade: true,
        };
        let (out, format) = transform.transform(pixels).unwrap();
        assert_eq!(format, DataFormat::Raw);
        assert_eq!(out.bands(), 1);
        assert!(out.data.iter().all(|&v| (0.0..=255.0).contains(&v)));
    }
}
