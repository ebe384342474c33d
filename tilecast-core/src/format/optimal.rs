//! Picks JPEG when the whole tile is opaque and PNG otherwise, ported from
//! the predecessor's `formats/optimal.py`.

use crate::error::RenderResult;
use crate::pixels::PixelCollection;
use crate::transform::DataFormat;

use super::{Format, Jpeg, Png};

#[derive(Debug, Clone, Copy, Default)]
pub struct Optimal;

impl Optimal {
    fn is_fully_opaque(pixels: &PixelCollection) -> bool {
        let (height, width) = (pixels.height(), pixels.width());
        (0..height).all(|row| (0..width).all(|col| pixels.data[[3, row, col]] == 255.0))
    }
}

impl Format for Optimal {
    fn encode(
        &self,
        pixels: &PixelCollection,
        data_format: DataFormat,
    ) -> RenderResult<(Vec<u8>, &'static str)> {
        if data_format == DataFormat::Rgba && Self::is_fully_opaque(pixels) {
            Jpeg.encode(pixels, data_format)
        } else {
            Png.encode(pixels, data_format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};

    #[test]
    fn picks_jpeg_when_fully_opaque() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let mut pixels = PixelCollection::empty_canvas(4, 2, 2, bounds);
        pixels.data.index_axis_mut(ndarray::Axis(0), 3).fill(255.0);
        let (bytes, content_type) = Optimal.encode(&pixels, DataFormat::Rgba).unwrap();
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(content_type, "image/jpeg");
    }

    #[test]
    fn picks_png_when_any_pixel_is_transparent() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let pixels = PixelCollection::empty_canvas(4, 2, 2, bounds);
        let (bytes, content_type) = Optimal.encode(&pixels, DataFormat::Rgba).unwrap();
        assert_eq!(&bytes[0..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
        assert_eq!(content_type, "image/png");
    }
}
