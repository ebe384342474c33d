//! Single-band palette-as-image output, ported from the predecessor's
//! `formats/color_ramp.py`: run raw values through a piecewise-linear
//! colormap (the same curve on R, G, and B) and hand the result to `Png`.
//! The default ramp is `marblecutter`'s grey-hills gradient; callers may
//! supply their own control points for other single-band products.

use ndarray::Array3;

use crate::error::{RenderError, RenderResult};
use crate::pixels::PixelCollection;
use crate::transform::DataFormat;

use super::{Format, Png};

/// `(t, value)` control points in `[0, 1]`, linearly interpolated between
/// neighbors — equivalent to a matplotlib `LinearSegmentedColormap` with
/// identical R/G/B channels.
#[derive(Debug, Clone)]
pub struct ColorRamp {
    stops: Vec<(f64, f64)>,
}

/// `marblecutter.formats.color_ramp.GREY_HILLS`: a grey hillshade-style
/// ramp that dips before brightening, rather than a monotonic greyscale.
const GREY_HILLS_STOPS: [(f64, f64); 4] = [
    (0.0, 0.0),
    (0.25, 0.0),
    (180.0 / 255.0, 0.5),
    (1.0, 170.0 / 255.0),
];

impl Default for ColorRamp {
    fn default() -> Self {
        Self {
            stops: GREY_HILLS_STOPS.to_vec(),
        }
    }
}

impl ColorRamp {
    pub fn new(stops: Vec<(f64, f64)>) -> Self {
        Self { stops }
    }

    fn sample(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let stops = &self.stops;

        if t <= stops[0].0 {
            return stops[0].1;
        }
        if t >= stops[stops.len() - 1].0 {
            return stops[stops.len() - 1].1;
        }

        for window in stops.windows(2) {
            let (t0, v0) = window[0];
            let (t1, v1) = window[1];
            if t >= t0 && t <= t1 {
                if (t1 - t0).abs() < f64::EPSILON {
                    return v1;
                }
                let frac = (t - t0) / (t1 - t0);
                return v0 + frac * (v1 - v0);
            }
        }

        stops[stops.len() - 1].1
    }
}

impl Format for ColorRamp {
    fn encode(
        &self,
        pixels: &PixelCollection,
        data_format: DataFormat,
    ) -> RenderResult<(Vec<u8>, &'static str)> {
        if data_format != DataFormat::Raw || pixels.bands() != 1 {
            return Err(RenderError::InvalidTileRequest(
                "color ramp encoding requires a single raw band".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let mut rgba = Array3::<f32>::zeros((4, height, width));

        for row in 0..height {
            for col in 0..width {
                let t = pixels.data[[0, row, col]].clamp(0.0, 255.0) as f64 / 255.0;
                let value = (self.sample(t) * 255.0).round() as f32;
                rgba[[0, row, col]] = value;
                rgba[[1, row, col]] = value;
                rgba[[2, row, col]] = value;
                rgba[[3, row, col]] = if pixels.mask[[row, col]] { 0.0 } else { 255.0 };
            }
        }

        let indexed = PixelCollection::new(rgba, pixels.mask.clone(), pixels.bounds);
        Png.encode(&indexed, DataFormat::Rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Bounds, Crs};

    #[test]
    fn ramp_endpoints_match_control_points() {
        let ramp = ColorRamp::default();
        assert_eq!(ramp.sample(0.0), 0.0);
        assert_eq!(ramp.sample(1.0), 170.0 / 255.0);
    }

    #[test]
    fn ramp_interpolates_between_stops() {
        let ramp = ColorRamp::default();
        let midpoint = ramp.sample(180.0 / 255.0);
        assert!((midpoint - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_multi_band_input() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let pixels = PixelCollection::empty_canvas(2, 2, 2, bounds);
        assert!(ColorRamp::default().encode(&pixels, DataFormat::Raw).is_err());
    }

    #[test]
    fn encodes_a_valid_png() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let mut pixels = PixelCollection::empty_canvas(1, 2, 2, bounds);
        pixels.mask.fill(false);
        let (bytes, content_type) = ColorRamp::default().encode(&pixels, DataFormat::Raw).unwrap();
        assert_eq!(&bytes[0..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);
        assert_eq!(content_type, "image/png");
    }
}
