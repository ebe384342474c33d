//! Pixel transformations (§4.6): hillshade, surface normals, terrain-RGB
//! encoding, palette/greyscale imagery, and the buffer-only no-op. Each
//! transformation owns an intrinsic buffer (in pixels) added around the
//! mosaic read before `transform` runs, and is responsible for saying how
//! much of that buffer to crop back off in `postprocess`.

mod buffer;
mod colormap;
mod greyscale;
mod hillshade;
mod image;
mod normal;
mod terrarium;

pub use buffer::Buffer;
pub use colormap::Colormap;
pub use greyscale::Greyscale;
pub use hillshade::Hillshade;
pub use image::Image;
pub use normal::Normal;
pub use terrarium::Terrarium;

use crate::error::RenderResult;
use crate::geometry::Bounds;
use crate::pixels::PixelCollection;

/// Which uint8 layout a transformed `PixelCollection` carries, so formats
/// know how to read its bands without re-deriving it from band count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Single band, raw (not yet RGBA) — e.g. Hillshade's uint8 output.
    Raw,
    Rgb,
    Rgba,
}

/// Non-negative pixel margins added on each side during `expand`, and
/// subtracted back off during `postprocess`. A margin clamped to zero at
/// a CRS's global extent (pole/antimeridian) stays zero rather than going
/// negative — the affected edge is filled by `postprocess`'s replicate/wrap
/// rule instead of being re-read.
#[derive(Debug, Clone, Copy, Default)]
pub struct CropOffsets {
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
    pub top: usize,
}

pub trait Transformation: std::fmt::Debug {
    /// Pixels of intrinsic buffer this transformation needs on every side
    /// before `transform` runs (e.g. Hillshade needs neighbors for its
    /// gradient). Zero for transformations that are pointwise.
    fn buffer(&self) -> usize {
        0
    }

    /// Expands `bounds`/`shape` by this transformation's buffer, clamped to
    /// the CRS's global extent; returns the offsets `postprocess` should
    /// crop back off.
    fn expand(&self, bounds: Bounds, shape: (u32, u32)) -> (Bounds, (u32, u32), CropOffsets) {
        let buf = self.buffer();
        if buf == 0 {
            return (bounds, shape, CropOffsets::default());
        }

        let (dx, dy) = crate::geometry::resolution(&bounds, shape.0, shape.1);

        let margin_x = dx * buf as f64;
        let margin_y = dy * buf as f64;
        let raw = Bounds::new(
            bounds.minx - margin_x,
            bounds.miny - margin_y,
            bounds.maxx + margin_x,
            bounds.maxy + margin_y,
            bounds.crs,
        );
        let (clamped, sides) = raw.clamp_to_extent();

        let offsets = CropOffsets {
            left: if sides.left { 0 } else { buf },
            bottom: if sides.bottom { 0 } else { buf },
            right: if sides.right { 0 } else { buf },
            top: if sides.top { 0 } else { buf },
        };
        let new_shape = (
            shape.0 + offsets.top as u32 + offsets.bottom as u32,
            shape.1 + offsets.left as u32 + offsets.right as u32,
        );

        (clamped, new_shape, offsets)
    }

    /// Runs the core pixel transform, returning the transformed pixels plus
    /// the uint8 layout they're now in.
    fn transform(&self, pixels: PixelCollection) -> RenderResult<(PixelCollection, DataFormat)>;

    /// Crops `offsets` back off, replicating/wrapping at edges that were
    /// clamped to zero during `expand` rather than re-reading past the
    /// CRS's global extent. The identity transformation's default impl
    /// (straight crop) is correct for every transformation except `Buffer`,
    /// which overrides it to be a no-op.
    fn postprocess(
        &self,
        pixels: PixelCollection,
        _data_format: DataFormat,
        offsets: CropOffsets,
    ) -> PixelCollection {
        crop(pixels, offsets)
    }
}

/// Straight pixel-margin crop, shared by every transformation except
/// `Buffer` (which keeps the full expanded canvas).
pub fn crop(pixels: PixelCollection, offsets: CropOffsets) -> PixelCollection {
    if offsets.left == 0 && offsets.right == 0 && offsets.top == 0 && offsets.bottom == 0 {
        return pixels;
    }

    use ndarray::s;
    let (height, width) = (pixels.height(), pixels.width());
    let row_end = height.saturating_sub(offsets.bottom);
    let col_end = width.saturating_sub(offsets.right);

    let data = pixels
        .data
        .slice(s![.., offsets.top..row_end, offsets.left..col_end])
        .to_owned();
    let mask = pixels
        .mask
        .slice(s![offsets.top..row_end, offsets.left..col_end])
        .to_owned();

    PixelCollection::new(data, mask, pixels.bounds)
        .with_band(pixels.band)
        .with_colormap(pixels.colormap)
}

/// Used by Hillshade/Normal to scale elevation before taking gradients,
/// correcting for Mercator's latitude-dependent horizontal distortion
/// (ported from the predecessor's `apply_latitude_adjustments`).
pub fn latitude_scale_factors(bounds: &Bounds, height: usize) -> Vec<f64> {
    use crate::geometry::Crs;

    if height == 0 {
        return Vec::new();
    }
    (0..height)
        .map(|row| {
            let t = row as f64 / (height - 1).max(1) as f64;
            let y = bounds.maxy + t * (bounds.miny - bounds.maxy);
            let lat = if bounds.crs == Crs::Wgs84 {
                y
            } else {
                mercator_y_to_latitude(y)
            };
            1.0 / lat.to_radians().cos()
        })
        .collect()
}

fn mercator_y_to_latitude(y: f64) -> f64 {
    const R: f64 = 6_378_137.0;
    (2.0 * (y / R).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees()
}
