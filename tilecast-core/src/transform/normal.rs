//! Surface normals + hypsometric tint. Ported from the predecessor's
//! `transformations/normal.py`: a unit-normal computed via `np.gradient`,
//! mapped from [-1,1] to [0,255] per channel, plus a 4th "h" channel
//! indexing a 256-entry height table concentrated in the 0-3000m range
//! where most land elevation actually falls.

use ndarray::{Array2, Array3};
use std::sync::OnceLock;

use crate::error::{RenderError, RenderResult};
use crate::geometry::resolution_in_meters;
use crate::pixels::PixelCollection;

use super::{latitude_scale_factors, DataFormat, Transformation};

/// Builds the 256-entry hypsometric table via the same geometric-growth
/// construction as the predecessor: 1km steps from -11000 to -1000, a
/// handful of fine bathymetric steps near zero, 20m steps across 0-3000m
/// (where population density concentrates), 50m steps to 6000m, then
/// 100m steps out to the table's end.
fn build_height_table() -> Vec<i32> {
    let mut table = Vec::with_capacity(256);
    for i in 0..11 {
        table.push(-11_000 + i * 1_000);
    }
    table.extend_from_slice(&[-100, -50, -20, -10, -1]);
    for i in 0..150 {
        table.push(20 * i);
    }
    for i in 0..60 {
        table.push(3_000 + 50 * i);
    }
    for i in 0..29 {
        table.push(6_000 + 100 * i);
    }
    table
}

fn height_table() -> &'static [i32] {
    static TABLE: OnceLock<Vec<i32>> = OnceLock::new();
    TABLE.get_or_init(build_height_table)
}

/// `255 - bisect_left(HEIGHT_TABLE, h)`: the table is flipped so sea-level
/// heights get high indices (and so high alpha, once used as a tint map),
/// and low/negative heights fall toward zero.
fn height_mapping_index(h: f64) -> u8 {
    let table = height_table();
    let pos = table.partition_point(|&v| f64::from(v) < h);
    (255 - pos.min(255) as i32).max(0) as u8
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Normal;

impl Transformation for Normal {
    fn buffer(&self) -> usize {
        4
    }

    fn transform(&self, pixels: PixelCollection) -> RenderResult<(PixelCollection, DataFormat)> {
        if pixels.bands() != 1 {
            return Err(RenderError::InvalidTileRequest(
                "normal requires a single-band elevation source".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let (dx, dy) = resolution_in_meters(&pixels.bounds, height as u32, width as u32);
        let scales = latitude_scale_factors(&pixels.bounds, height);

        let mut elevation = Array2::<f64>::zeros((height, width));
        for row in 0..height {
            for col in 0..width {
                elevation[[row, col]] = f64::from(pixels.data[[0, row, col]]) * scales[row];
            }
        }

        let mut out = Array3::<f32>::zeros((4, height, width));
        for row in 0..height {
            for col in 0..width {
                let row_prev = row.saturating_sub(1);
                let row_next = (row + 1).min(height - 1);
                let col_prev = col.saturating_sub(1);
                let col_next = (col + 1).min(width - 1);
                let row_span = (row_next - row_prev).max(1) as f64;
                let col_span = (col_next - col_prev).max(1) as f64;

                // `np.gradient(data, 2)`'s spacing of 2: interior samples
                // divide by `2 * row_span` (central difference over a
                // 2-unit step), and since `row_span` is already 1 at an
                // edge (a one-sided difference), the same `2 *` factor
                // applies there too.
                let ygrad = (elevation[[row_next, col]] - elevation[[row_prev, col]]) / (2.0 * row_span);
                let xgrad = (elevation[[row, col_next]] - elevation[[row, col_prev]]) / (2.0 * col_span);

                let nx = -1.0 / dx * xgrad;
                let ny = 1.0 / dy * ygrad;
                let nz = 1.0;
                let norm = (nx * nx + ny * ny + nz * nz).sqrt().max(f64::EPSILON);

                out[[0, row, col]] = (128.0 * (nx / norm + 1.0)).clamp(0.0, 255.0) as f32;
                out[[1, row, col]] = (128.0 * (ny / norm + 1.0)).clamp(0.0, 255.0) as f32;
                out[[2, row, col]] = (128.0 * (nz / norm + 1.0)).clamp(0.0, 255.0) as f32;

                out[[3, row, col]] = if pixels.mask[[row, col]] {
                    0.0
                } else {
                    f64::from(height_mapping_index(elevation[[row, col]])) as f32
                };
            }
        }

        Ok((
            PixelCollection::new(out, pixels.mask, pixels.bounds),
            DataFormat::Rgba,
        ))
    }
}
