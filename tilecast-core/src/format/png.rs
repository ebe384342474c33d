//! RGBA PNG encoding, ported from the predecessor's `formats/png.py`.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::{RenderError, RenderResult};
use crate::pixels::PixelCollection;
use crate::transform::DataFormat;

use super::Format;

#[derive(Debug, Clone, Copy, Default)]
pub struct Png;

impl Format for Png {
    fn encode(
        &self,
        pixels: &PixelCollection,
        data_format: DataFormat,
    ) -> RenderResult<(Vec<u8>, &'static str)> {
        if data_format != DataFormat::Rgba {
            return Err(RenderError::InvalidTileRequest(
                "png encoding requires RGBA pixels".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let mut rgba = Vec::with_capacity(height * width * 4);
        for row in 0..height {
            for col in 0..width {
                for band in 0..4 {
                    rgba.push(pixels.data[[band, row, col]].round().clamp(0.0, 255.0) as u8);
                }
            }
        }

        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(&rgba, width as u32, height as u32, ExtendedColorType::Rgba8)
            .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;
        Ok((out, "image/png"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};

    #[test]
    fn encodes_a_valid_png_signature() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let pixels = PixelCollection::empty_canvas(4, 2, 2, bounds);
        let (bytes, content_type) = Png.encode(&pixels, DataFormat::Rgba).unwrap();
        assert_eq!(&bytes[0..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
        assert_eq!(content_type, "image/png");
    }

    #[test]
    fn rejects_non_rgba_input() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let pixels = PixelCollection::empty_canvas(1, 2, 2, bounds);
        assert!(Png.encode(&pixels, DataFormat::Raw).is_err());
    }
}
