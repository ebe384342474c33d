//! Single-band palette expansion, ported from the predecessor's
//! `transformations/colormap.py`: look up each index in a fixed RGBA LUT,
//! then delegate to `Image` for the mask/alpha handling.

use ndarray::Array3;

use crate::error::{RenderError, RenderResult};
use crate::pixels::{ColorMap, PixelCollection};

use super::{DataFormat, Image, Transformation};

#[derive(Debug, Clone)]
pub struct Colormap {
    lut: ColorMap,
}

impl Colormap {
    pub fn new(lut: ColorMap) -> Self {
        Self { lut }
    }
}

impl Transformation for Colormap {
    fn transform(&self, pixels: PixelCollection) -> RenderResult<(PixelCollection, DataFormat)> {
        if pixels.bands() != 1 {
            return Err(RenderError::InvalidTileRequest(
                "colormap requires a single-band source".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let mut rgba = Array3::<f32>::zeros((4, height, width));

        for row in 0..height {
            for col in 0..width {
                let index = pixels.data[[0, row, col]].clamp(0.0, 255.0) as u8;
                let [r, g, b, a] = self.lut.lookup(index);
                rgba[[0, row, col]] = f32::from(r);
                rgba[[1, row, col]] = f32::from(g);
                rgba[[2, row, col]] = f32::from(b);
                rgba[[3, row, col]] = f32::from(a);
            }
        }

        let indexed = PixelCollection::new(rgba, pixels.mask, pixels.bounds);
        Image.transform(indexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};

    #[test]
    fn maps_index_through_lut() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let mut pixels = PixelCollection::empty_canvas(1, 1, 1, bounds);
        pixels.mask.fill(false);
        pixels.data[[0, 0, 0]] = 5.0;

        let lut = ColorMap::from_entries([(5, [10, 20, 30, 255])]);
        let (out, _) = Colormap::new(lut).transform(pixels).unwrap();
        assert_eq!(
            (out.data[[0, 0, 0]], out.data[[1, 0, 0]], out.data[[2, 0, 0]]),
            (10.0, 20.0, 30.0)
        );
    }
}
