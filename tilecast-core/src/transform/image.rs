//! Multi-band imagery to RGBA, ported from the predecessor's
//! `transformations/image.py`: pass 3-band data through as RGB, reject
//! anything else, and synthesize alpha from the AND of per-band masks
//! when the source itself carries no alpha band.

use ndarray::Array3;

use crate::error::{RenderError, RenderResult};
use crate::pixels::PixelCollection;

use super::{DataFormat, Transformation};

#[derive(Debug, Clone, Copy, Default)]
pub struct Image;

impl Transformation for Image {
    fn transform(&self, pixels: PixelCollection) -> RenderResult<(PixelCollection, DataFormat)> {
        let bands = pixels.bands();
        if !(3..=4).contains(&bands) {
            return Err(RenderError::InvalidTileRequest(format!(
                "image transform requires 3 or 4 bands, got {bands}"
            )));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let mut out = Array3::<f32>::zeros((4, height, width));

        for row in 0..height {
            for col in 0..width {
                out[[0, row, col]] = pixels.data[[0, row, col]].clamp(0.0, 255.0);
                out[[1, row, col]] = pixels.data[[1, row, col]].clamp(0.0, 255.0);
                out[[2, row, col]] = pixels.data[[2, row, col]].clamp(0.0, 255.0);
                out[[3, row, col]] = if bands == 4 {
                    pixels.data[[3, row, col]].clamp(0.0, 255.0)
                } else if pixels.mask[[row, col]] {
                    0.0
                } else {
                    255.0
                };
            }
        }

        Ok((
            PixelCollection::new(out, pixels.mask, pixels.bounds),
            DataFormat::Rgba,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};

    #[test]
    fn rejects_band_counts_outside_three_or_four() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let pixels = PixelCollection::empty_canvas(2, 2, 2, bounds);
        assert!(Image.transform(pixels).is_err());
    }

    #[test]
    fn synthesizes_alpha_from_mask_when_three_bands() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let mut pixels = PixelCollection::empty_canvas(3, 2, 2, bounds);
        pixels.mask[[0, 0]] = false;
        // [0,1] stays masked.

        let (out, format) = Image.transform(pixels).unwrap();
        assert_eq!(format, DataFormat::Rgba);
        assert_eq!(out.data[[3, 0, 0]], 255.0);
        assert_eq!(out.data[[3, 0, 1]], 0.0);
    }
}
