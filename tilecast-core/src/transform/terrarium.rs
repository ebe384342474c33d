//! Terrarium RGB elevation encoding, ported byte-for-byte from the
//! predecessor's `transformations/terrarium.py`: `u = elev + 32768`
//! clipped to `[0, 65535]`, then `R = u/256, G = u%256, B = (u*256)%256`.

use ndarray::Array3;

use crate::error::{RenderError, RenderResult};
use crate::pixels::PixelCollection;

use super::{DataFormat, Transformation};

#[derive(Debug, Clone, Copy, Default)]
pub struct Terrarium;

impl Transformation for Terrarium {
    fn transform(&self, pixels: PixelCollection) -> RenderResult<(PixelCollection, DataFormat)> {
        if pixels.bands() != 1 {
            return Err(RenderError::InvalidTileRequest(
                "terrarium requires a single-band elevation source".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let mut out = Array3::<f32>::zeros((3, height, width));

        for row in 0..height {
            for col in 0..width {
                let elevation = f64::from(pixels.data[[0, row, col]]);
                let u = (elevation + 32768.0).clamp(0.0, 65535.0);
                out[[0, row, col]] = (u / 256.0).floor() as f32;
                out[[1, row, col]] = (u % 256.0).floor() as f32;
                out[[2, row, col]] = ((u * 256.0) % 256.0).floor() as f32;
            }
        }

        Ok((
            PixelCollection::new(out, pixels.mask, pixels.bounds),
            DataFormat::Rgb,
        ))
    }
}

/// Decodes a Terrarium RGB triple back to an elevation in meters, the
/// inverse of `Terrarium::transform`. Exists mainly to support the
/// round-trip invariant in tests; production callers only ever encode.
pub fn decode(r: u8, g: u8, b: u8) -> f64 {
    (f64::from(r) * 256.0 + f64::from(g) + f64::from(b) / 256.0) - 32768.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(-32768.0)]
    #[case(32767.0)]
    #[case(8848.0)]
    #[case(-10994.0)]
    fn round_trips_integer_elevations(#[case] elevation: f64) {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let mut pixels = PixelCollection::empty_canvas(1, 1, 1, bounds);
        pixels.data[[0, 0, 0]] = elevation as f32;
        pixels.mask.fill(false);

        let (out, _) = Terrarium.transform(pixels).unwrap();
        let (r, g, b) = (
            out.data[[0, 0, 0]] as u8,
            out.data[[1, 0, 0]] as u8,
            out.data[[2, 0, 0]] as u8,
        );
        assert_eq!(decode(r, g, b), elevation);
    }

    #[test]
    fn round_trips_fractional_elevations_within_tolerance() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let mut pixels = PixelCollection::empty_canvas(1, 1, 1, bounds);
        pixels.data[[0, 0, 0]] = 123.456;
        pixels.mask.fill(false);

        let (out, _) = Terrarium.transform(pixels).unwrap();
        let (r, g, b) = (
            out.data[[0, 0, 0]] as u8,
            out.data[[1, 0, 0]] as u8,
            out.data[[2, 0, 0]] as u8,
        );
        // `floor`-based quantization (matching the predecessor's
        // `astype(uint8)` truncation) can land up to a full B-channel step
        // below the true value, so the tolerance is one step, not half.
        assert!((decode(r, g, b) - 123.456).abs() <= 1.0 / 256.0 + 1e-6);
    }
}
