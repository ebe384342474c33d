//! Masked pixel arrays: the `(data, mask)` pair carried through the
//! mosaic, transformations, and formats stages. Every binary op that
//! writes pixels also composes masks, per the data-model invariants.

use ndarray::{s, Array2, Array3};

use crate::geometry::Bounds;

/// RGBA lookup table mapping an 8-bit index to a color, used by the
/// Colormap transformation and by recipe-level palette expansion.
#[derive(Debug, Clone)]
pub struct ColorMap {
    entries: [[u8; 4]; 256],
}

impl ColorMap {
    pub fn from_entries(pairs: impl IntoIterator<Item = (u8, [u8; 4])>) -> Self {
        let mut entries = [[0, 0, 0, 0]; 256];
        for (index, color) in pairs {
            entries[index as usize] = color;
        }
        Self { entries }
    }

    pub fn lookup(&self, index: u8) -> [u8; 4] {
        self.entries[index as usize]
    }
}

/// A masked numeric raster: `data` is `(bands, height, width)`, `mask` is
/// `(height, width)` shared across bands. A pixel is valid iff `mask` is
/// `false` at that location.
#[derive(Debug, Clone)]
pub struct PixelCollection {
    pub data: Array3<f32>,
    pub mask: Array2<bool>,
    pub bounds: Bounds,
    /// Canvas band this collection fills; `None` means "all bands".
    pub band: Option<usize>,
    pub colormap: Option<ColorMap>,
}

impl PixelCollection {
    pub fn new(data: Array3<f32>, mask: Array2<bool>, bounds: Bounds) -> Self {
        assert_eq!(
            data.shape()[1..],
            mask.shape()[..],
            "data/mask shape mismatch"
        );
        Self {
            data,
            mask,
            bounds,
            band: None,
            colormap: None,
        }
    }

    pub fn with_band(mut self, band: Option<usize>) -> Self {
        self.band = band;
        self
    }

    pub fn with_colormap(mut self, colormap: Option<ColorMap>) -> Self {
        self.colormap = colormap;
        self
    }

    pub fn bands(&self) -> usize {
        self.data.shape()[0]
    }

    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }

    /// A fully-masked canvas of `(bands, height, width)` over `bounds`.
    /// Invariant: every pixel stays masked until a paste overwrites it.
    pub fn empty_canvas(bands: usize, height: usize, width: usize, bounds: Bounds) -> Self {
        Self::new(
            Array3::zeros((bands, height, width)),
            Array2::from_elem((height, width), true),
            bounds,
        )
    }

    pub fn is_fully_opaque(&self) -> bool {
        !self.mask.iter().any(|&masked| masked)
    }

    pub fn unmasked_count(&self) -> usize {
        self.mask.iter().filter(|&&masked| !masked).count()
    }

    /// View of a single band, for transformations that require exactly
    /// one input band (Hillshade, Normal, Terrarium, Colormap, Greyscale).
    pub fn single_band(&self) -> Option<ndarray::ArrayView2<'_, f32>> {
        if self.bands() != 1 {
            return None;
        }
        Some(self.data.slice(s![0, .., ..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Crs;

    #[test]
    fn empty_canvas_is_fully_masked() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let canvas = PixelCollection::empty_canvas(1, 4, 4, bounds);
        assert_eq!(canvas.unmasked_count(), 0);
        assert!(!canvas.is_fully_opaque());
    }

    #[test]
    fn fully_unmasked_is_opaque() {
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::WebMercator);
        let mut canvas = PixelCollection::empty_canvas(1, 2, 2, bounds);
        canvas.mask.fill(false);
        assert!(canvas.is_fully_opaque());
    }
}
