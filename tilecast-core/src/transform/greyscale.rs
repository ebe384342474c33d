//! Single-band to RGB(A) by triple-replicating the band, ported from the
//! predecessor's `transformations/greyscale.py`, then delegating to
//! `Image` for mask/alpha handling.

use ndarray::Array3;

use crate::error::{RenderError, RenderResult};
use crate::pixels::PixelCollection;

use super::{DataFormat, Image, Transformation};

#[derive(Debug, Clone, Copy, Default)]
pub struct Greyscale;

impl Transformation for Greyscale {
    fn transform(&self, pixels: PixelCollection) -> RenderResult<(PixelCollection, DataFormat)> {
        if pixels.bands() != 1 {
            return Err(RenderError::InvalidTileRequest(
                "greyscale requires a single-band source".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let mut triple = Array3::<f32>::zeros((3, height, width));
        for band in 0..3 {
            triple
                .index_axis_mut(ndarray::Axis(0), band)
                .assign(&pixels.data.index_axis(ndarray::Axis(0), 0));
        }

        Image.transform(PixelCollection::new(triple, pixels.mask, pixels.bounds))
    }
}
