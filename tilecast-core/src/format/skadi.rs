//! SRTM `.hgt` elevation output, ported from the predecessor's
//! `formats/skadi.py`: cast to `int16`, write through GDAL's SRTMHGT
//! driver with a filename the driver requires for its own hemisphere
//! parsing, then gzip the result.

use gdal::cpl::CslStringList;
use gdal::spatial_ref::SpatialRef;
use gdal::Driver;

use tilecast_tile_utils::encode_gzip;

use crate::error::{RenderError, RenderResult};
use crate::pixels::PixelCollection;
use crate::transform::DataFormat;

use super::vsimem::{next_vsimem_id, read_back_and_unlink};
use super::Format;

#[derive(Debug, Clone, Copy, Default)]
pub struct Skadi;

/// `.hgt` filename convention the SRTMHGT driver requires to infer the
/// tile's hemisphere and origin, e.g. `N37W123.hgt`.
fn hgt_filename(minx: f64, miny: f64) -> String {
    let lon = minx.round() as i64;
    let lat = miny.round() as i64;
    let ns = if lat < 0 { 'S' } else { 'N' };
    let ew = if lon < 0 { 'W' } else { 'E' };
    format!("{ns}{:02}{ew}{:03}.hgt", lat.abs(), lon.abs())
}

impl Format for Skadi {
    fn encode(
        &self,
        pixels: &PixelCollection,
        data_format: DataFormat,
    ) -> RenderResult<(Vec<u8>, &'static str)> {
        if data_format != DataFormat::Raw || pixels.bands() != 1 {
            return Err(RenderError::InvalidTileRequest(
                "skadi encoding requires a single raw elevation band".into(),
            ));
        }

        let (height, width) = (pixels.height(), pixels.width());
        let filename = hgt_filename(pixels.bounds.minx, pixels.bounds.miny);
        let path = format!("/vsimem/{}-{}", next_vsimem_id(), filename);

        let mut options = CslStringList::new();
        options
            .set_name_value("TFW", "NO")
            .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;

        let driver = Driver::get_by_name("SRTMHGT")
            .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;

        {
            let mut dataset = driver
                .create_with_band_type_with_options::<i16>(&path, width, height, 1, &options)
                .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;

            let (minx, miny, maxx, maxy) =
                (pixels.bounds.minx, pixels.bounds.miny, pixels.bounds.maxx, pixels.bounds.maxy);
            let dx = (maxx - minx) / width as f64;
            let dy = (maxy - miny) / height as f64;
            dataset
                .set_geo_transform(&[minx, dx, 0.0, maxy, 0.0, -dy])
                .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;

            let srs = SpatialRef::from_epsg(pixels.bounds.crs.epsg())
                .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;
            dataset
                .set_spatial_ref(&srs)
                .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;

            let mut band = dataset
                .rasterband(1)
                .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;
            band.set_no_data_value(Some(f64::from(i16::MIN)))
                .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;

            let mut buffer = gdal::raster::Buffer::new((width, height), vec![0i16; width * height]);
            for row in 0..height {
                for col in 0..width {
                    buffer.data_mut()[row * width + col] = if pixels.mask[[row, col]] {
                        i16::MIN
                    } else {
                        pixels.data[[0, row, col]].round().clamp(
                            f64::from(i16::MIN + 1) as f32,
                            f64::from(i16::MAX) as f32,
                        ) as i16
                    };
                }
            }
            band.write((0, 0), (width, height), &buffer)
                .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;
        }

        let raw = read_back_and_unlink(&path)?;
        let gzipped = encode_gzip(&raw).map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;
        Ok((gzipped, "application/gzip"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_reflects_hemisphere_and_zero_pads() {
        assert_eq!(hgt_filename(-122.9, 37.4), "N37W123.hgt");
        assert_eq!(hgt_filename(18.4, -33.9), "S34E018.hgt");
        assert_eq!(hgt_filename(7.0, 5.0), "N05E007.hgt");
    }

    #[test]
    fn rejects_multi_band_input() {
        use crate::geometry::{Bounds, Crs};
        let bounds = Bounds::new(0.0, 0.0, 1.0, 1.0, Crs::Wgs84);
        let pixels = PixelCollection::empty_canvas(2, 2, 2, bounds);
        assert!(Skadi.encode(&pixels, DataFormat::Raw).is_err());
    }
}
