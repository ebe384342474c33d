//! Output encoders (§4.7): PNG/JPEG/Optimal for RGBA imagery, ColorRamp
//! for palette-mapped single-band data, and the two georeferenced raw
//! formats (GeoTIFF, Skadi) that round-trip through GDAL's in-memory
//! `/vsimem/` filesystem the same way the predecessor's `rasterio`
//! `MemoryFile` does.

pub mod color_ramp;
pub mod geotiff;
pub mod jpeg;
pub mod optimal;
pub mod png;
pub mod skadi;
mod vsimem;

pub use color_ramp::ColorRamp;
pub use geotiff::GeoTiff;
pub use jpeg::Jpeg;
pub use optimal::Optimal;
pub use png::Png;
pub use skadi::Skadi;

use crate::error::RenderResult;
use crate::pixels::PixelCollection;
use crate::transform::DataFormat;

/// One of the §4.7 output encoders: takes the transformed pixels (tagged
/// with the uint8 layout `transform` produced) and emits bytes plus the
/// MIME type those bytes were actually encoded as. A fixed `content_type`
/// isn't enough on its own — `Optimal` picks JPEG or PNG per tile — so the
/// type travels with the encoded bytes rather than being a separate call.
pub trait Format: std::fmt::Debug {
    fn encode(
        &self,
        pixels: &PixelCollection,
        data_format: DataFormat,
    ) -> RenderResult<(Vec<u8>, &'static str)>;
}
