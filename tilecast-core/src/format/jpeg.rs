//! RGB JPEG encoding, ported from the predecessor's `formats/jpeg.py`;
//! unlike PNG, JPEG carries no alpha channel so the source must already be
//! fully opaque (the `Optimal` format is what decides that and falls back
//! to PNG otherwise).

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::error::{RenderError, RenderResult};
use crate::pixels::PixelCollection;
use crate::transform::DataFormat;

use super::Format;

const QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, Default)]
pub struct Jpeg;

impl Format for Jpeg {
    fn encode(
        &self,
        pixels: &PixelCollection,
        data_format: DataFormat,
    ) -> RenderResult<(Vec<u8>, &'static str)> {
        if data_format != DataFormat::Rgba {
            return Err(RenderError::InvalidTileRequest(
                "jpeg encoding requires RGBA pixels (alpha is dropped)".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let mut rgb = Vec::with_capacity(height * width * 3);
        for row in 0..height {
            for col in 0..width {
                for band in 0..3 {
                    rgb.push(pixels.data[[band, row, col]].round().clamp(0.0, 255.0) as u8);
                }
            }
        }

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, QUALITY)
            .write_image(&rgb, width as u32, height as u32, ExtendedColorType::Rgb8)
            .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;
        Ok((out, "image/jpeg"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};

    #[test]
    fn encodes_a_valid_jpeg_signature() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let pixels = PixelCollection::empty_canvas(4, 2, 2, bounds);
        let (bytes, content_type) = Jpeg.encode(&pixels, DataFormat::Rgba).unwrap();
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(content_type, "image/jpeg");
    }
}
