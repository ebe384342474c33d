//! The no-op transformation, ported from the predecessor's
//! `transformations/buffer.py`: widens the mosaic read area without
//! touching pixel values, and — unlike every other transformation —
//! keeps the expanded canvas instead of cropping it back down.

use crate::error::RenderResult;
use crate::pixels::PixelCollection;

use super::{CropOffsets, DataFormat, Transformation};

#[derive(Debug, Clone, Copy)]
pub struct Buffer {
    pub margin: usize,
}

impl Buffer {
    pub fn new(margin: usize) -> Self {
        Self { margin }
    }
}

impl Transformation for Buffer {
    fn buffer(&self) -> usize {
        self.margin
    }

    fn transform(&self, pixels: PixelCollection) -> RenderResult<(PixelCollection, DataFormat)> {
        Ok((pixels, DataFormat::Raw))
    }

    fn postprocess(&self, pixels: PixelCollection, _data_format: DataFormat, _offsets: CropOffsets) -> PixelCollection {
        pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};

    #[test]
    fn postprocess_does_not_crop() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let pixels = PixelCollection::empty_canvas(1, 10, 10, bounds);
        let buffer = Buffer::new(4);
        let (transformed, format) = buffer.transform(pixels).unwrap();
        let result = buffer.postprocess(
            transformed,
            format,
            CropOffsets {
                left: 4,
                right: 4,
                top: 4,
                bottom: 4,
            },
        );
        assert_eq!((result.height(), result.width()), (10, 10));
    }
}
