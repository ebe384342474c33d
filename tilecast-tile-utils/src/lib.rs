#![doc = include_str!("../README.md")]

// Tile index / bounding-box math in this module follows the same formulas as
// https://github.com/maplibre/martin's `martin-tile-utils`, which in turn credits
// https://github.com/maplibre/mbtileserver-rs (Kaveh Karimi, MIT OR Apache-2.0).

use std::f64::consts::PI;
use std::fmt::{Display, Formatter, Result};

/// circumference of the earth in meters
pub const EARTH_CIRCUMFERENCE: f64 = 40_075_016.685_578_5;
/// circumference of the earth in degrees
pub const EARTH_CIRCUMFERENCE_DEGREES: u32 = 360;

/// radius of the earth in meters
pub const EARTH_RADIUS: f64 = EARTH_CIRCUMFERENCE / 2.0 / PI;

/// Highest zoom level a `(z, x, y)` tile request may name.
pub const MAX_ZOOM: u8 = 22;

mod decoders;
pub use decoders::{decode_gzip, encode_gzip};

#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if f.alternate() {
            write!(f, "{}/{}/{}", self.z, self.x, self.y)
        } else {
            write!(f, "{},{},{}", self.z, self.x, self.y)
        }
    }
}

impl TileCoord {
    /// Checks provided coordinates for validity
    /// before constructing a [`TileCoord`] instance.
    ///
    /// Check [`Self::new_unchecked`] if you are sure that your inputs are possible.
    #[must_use]
    pub fn new_checked(z: u8, x: u32, y: u32) -> Option<TileCoord> {
        Self::is_possible_on_zoom_level(z, x, y).then_some(Self { z, x, y })
    }

    /// Constructs a [`TileCoord`] instance from arguments without checking that the tile can exist.
    ///
    /// Check [`Self::new_checked`] if you are unsure if your inputs are possible.
    #[must_use]
    pub fn new_unchecked(z: u8, x: u32, y: u32) -> TileCoord {
        Self { z, x, y }
    }

    /// Checks that zoom `z` is within [`MAX_ZOOM`] and `x`/`y` is possible on said zoom level.
    #[must_use]
    pub fn is_possible_on_zoom_level(z: u8, x: u32, y: u32) -> bool {
        if z > MAX_ZOOM {
            return false;
        }

        let side_len = 1_u32 << z;
        x < side_len && y < side_len
    }
}

/// Raster formats this pipeline can emit. Vector/MVT-oriented formats (the bulk of the
/// teacher's own `Format` enum) have no counterpart here and are not carried over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Jpeg,
    Png,
}

impl Format {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            _ => None?,
        })
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        match *self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(match *self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        })
    }
}

/// Content-encoding of the response body, independent of the image [`Format`].
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Encoding {
    /// PNG/JPEG bytes are already compressed by the codec itself.
    Internal,
    /// gzip, used for the Skadi (`SRTMHGT`) format.
    Gzip,
}

impl Encoding {
    #[must_use]
    pub fn content_encoding(&self) -> Option<&str> {
        match *self {
            Self::Internal => None,
            Self::Gzip => Some("gzip"),
        }
    }
}

/// Convert longitude and latitude to tile `(x,y)` coordinates for a given zoom.
#[must_use]
#[expect(clippy::cast_possible_truncation)]
#[expect(clippy::cast_sign_loss)]
pub fn tile_index(lng: f64, lat: f64, zoom: u8) -> (u32, u32) {
    let tile_size = EARTH_CIRCUMFERENCE / f64::from(1_u32 << zoom);
    let (x, y) = wgs84_to_webmercator(lng, lat);
    let col = (((x - (EARTH_CIRCUMFERENCE * -0.5)).abs() / tile_size) as u32).min((1 << zoom) - 1);
    let row = ((((EARTH_CIRCUMFERENCE * 0.5) - y).abs() / tile_size) as u32).min((1 << zoom) - 1);
    (col, row)
}

/// Convert min/max XYZ tile coordinates to bounding box values.
///
/// The result is `[min_lng, min_lat, max_lng, max_lat]`.
///
/// # Panics
/// Panics if `zoom` is greater than [`MAX_ZOOM`].
#[must_use]
pub fn xyz_to_bbox(zoom: u8, min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> [f64; 4] {
    assert!(zoom <= MAX_ZOOM, "zoom {zoom} must be <= {MAX_ZOOM}");

    let tile_length = EARTH_CIRCUMFERENCE / f64::from(1_u32 << zoom);

    let left_down_bbox = tile_bbox(min_x, max_y, tile_length);
    let right_top_bbox = tile_bbox(max_x, min_y, tile_length);

    let (min_lng, min_lat) = webmercator_to_wgs84(left_down_bbox[0], left_down_bbox[1]);
    let (max_lng, max_lat) = webmercator_to_wgs84(right_top_bbox[2], right_top_bbox[3]);
    [min_lng, min_lat, max_lng, max_lat]
}

/// Web Mercator bounding box `[minx, miny, maxx, maxy]` for a tile, in meters.
#[must_use]
pub fn xyz_to_mercator_bbox(zoom: u8, x: u32, y: u32) -> [f64; 4] {
    let tile_length = EARTH_CIRCUMFERENCE / f64::from(1_u32 << zoom);
    tile_bbox(x, y, tile_length)
}

#[expect(clippy::cast_lossless)]
fn tile_bbox(x: u32, y: u32, tile_length: f64) -> [f64; 4] {
    let min_x = EARTH_CIRCUMFERENCE * -0.5 + x as f64 * tile_length;
    let max_y = EARTH_CIRCUMFERENCE * 0.5 - y as f64 * tile_length;

    [min_x, max_y - tile_length, min_x + tile_length, max_y]
}

/// Convert bounding box to a tile box `(min_x, min_y, max_x, max_y)` for a given zoom.
#[must_use]
pub fn bbox_to_xyz(left: f64, bottom: f64, right: f64, top: f64, zoom: u8) -> (u32, u32, u32, u32) {
    let (min_col, min_row) = tile_index(left, top, zoom);
    let (max_col, max_row) = tile_index(right, bottom, zoom);
    (min_col, min_row, max_col, max_row)
}

/// Compute precision of a zoom level, i.e. how many decimal digits of longitude/latitude matter.
#[must_use]
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn get_zoom_precision(zoom: u8) -> usize {
    assert!(zoom <= MAX_ZOOM, "zoom {zoom} must be <= {MAX_ZOOM}");
    let lng_delta = webmercator_to_wgs84(EARTH_CIRCUMFERENCE / f64::from(1_u32 << zoom), 0.0).0;
    let log = lng_delta.log10() - 0.5;
    if log > 0.0 { 0 } else { -log.ceil() as usize }
}

/// transform [`WebMercator`](https://epsg.io/3857) to [WGS84](https://epsg.io/4326)
// from https://github.com/Esri/arcgis-osm-editor/blob/e4b9905c264aa22f8eeb657efd52b12cdebea69a/src/OSMWeb10_1/Utils/WebMercator.cs
#[must_use]
pub fn webmercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lng = (x / EARTH_RADIUS).to_degrees();
    let lat = f64::atan(f64::sinh(y / EARTH_RADIUS)).to_degrees();
    (lng, lat)
}

/// transform [WGS84](https://epsg.io/4326) to [`WebMercator`](https://epsg.io/3857)
// from https://github.com/Esri/arcgis-osm-editor/blob/e4b9905c264aa22f8eeb657efd52b12cdebea69a/src/OSMWeb10_1/Utils/WebMercator.cs
#[must_use]
pub fn wgs84_to_webmercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon * PI / 180.0 * EARTH_RADIUS;

    let y_sin = lat.to_radians().sin();
    let y = EARTH_RADIUS / 2.0 * ((1.0 + y_sin) / (1.0 - y_sin)).ln();

    (x, y)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(-180.0, 85.0511, 0, (0,0))]
    #[case(-180.0, 85.0511, 1, (0,0))]
    #[case(-180.0, 85.0511, 2, (0,0))]
    #[case(0.0, 0.0, 0, (0,0))]
    #[case(0.0, 0.0, 1, (1,1))]
    #[case(0.0, 0.0, 2, (2,2))]
    #[case(0.0, 1.0, 0, (0,0))]
    #[case(0.0, 1.0, 1, (1,0))]
    #[case(0.0, 1.0, 2, (2,1))]
    fn test_tile_colrow(
        #[case] lng: f64,
        #[case] lat: f64,
        #[case] zoom: u8,
        #[case] expected: (u32, u32),
    ) {
        assert_eq!(
            expected,
            tile_index(lng, lat, zoom),
            "{lng},{lat}@z{zoom} should be {expected:?}"
        );
    }

    #[rstest]
    // you could easily get test cases from maptiler: https://www.maptiler.com/google-maps-coordinates-tile-bounds-projection/#4/-118.82/71.02
    #[case(0, 0, 0, 0, 0, [-180.0,-85.051_128_779_806_6,180.0,85.051_128_779_806_6])]
    #[case(1, 0, 0, 0, 0, [-180.0,0.0,0.0,85.051_128_779_806_6])]
    #[case(5, 1, 1, 2, 2, [-168.75,81.093_213_852_608_37,-146.25,83.979_259_498_862_05])]
    #[case(5, 1, 3, 2, 5, [-168.75,74.019_543_311_502_26,-146.25,81.093_213_852_608_37])]
    fn test_xyz_to_bbox(
        #[case] zoom: u8,
        #[case] min_x: u32,
        #[case] min_y: u32,
        #[case] max_x: u32,
        #[case] max_y: u32,
        #[case] expected: [f64; 4],
    ) {
        let bbox = xyz_to_bbox(zoom, min_x, min_y, max_x, max_y);
        assert_relative_eq!(bbox[0], expected[0], epsilon = f64::EPSILON * 2.0);
        assert_relative_eq!(bbox[1], expected[1], epsilon = f64::EPSILON * 2.0);
        assert_relative_eq!(bbox[2], expected[2], epsilon = f64::EPSILON * 2.0);
        assert_relative_eq!(bbox[3], expected[3], epsilon = f64::EPSILON * 2.0);
    }

    #[rstest]
    #[case(0, (0, 0, 0, 0))]
    #[case(1, (0, 1, 0, 1))]
    #[case(2, (0, 3, 0, 3))]
    #[case(3, (0, 7, 0, 7))]
    #[case(4, (0, 14, 1, 15))]
    #[case(5, (0, 29, 2, 31))]
    #[case(6, (0, 58, 5, 63))]
    #[case(7, (0, 116, 11, 126))]
    #[case(8, (0, 233, 23, 253))]
    #[case(9, (0, 466, 47, 507))]
    #[case(10, (1, 933, 94, 1_014))]
    #[case(11, (3, 1_866, 188, 2_029))]
    #[case(12, (6, 3_732, 377, 4_059))]
    #[case(13, (12, 7_465, 755, 8_119))]
    #[case(14, (25, 14_931, 1_510, 16_239))]
    #[case(15, (51, 29_863, 3_020, 32_479))]
    #[case(16, (102, 59_727, 6_041, 64_958))]
    #[case(17, (204, 119_455, 12_083, 129_917))]
    #[case(18, (409, 238_911, 24_166, 259_834))]
    #[case(19, (819, 477_823, 48_332, 519_669))]
    #[case(20, (1_638, 955_647, 96_665, 1_039_339))]
    #[case(21, (3_276, 1_911_295, 193_331, 2_078_678))]
    #[case(22, (6_553, 3_822_590, 386_662, 4_157_356))]
    fn test_box_to_xyz(#[case] zoom: u8, #[case] expected_xyz: (u32, u32, u32, u32)) {
        let actual_xyz = bbox_to_xyz(
            -179.437_499_999_999_55,
            -84.769_878_779_806_56,
            -146.812_499_999_999_6,
            -81.374_463_852_608_33,
            zoom,
        );
        assert_eq!(
            actual_xyz, expected_xyz,
            "zoom {zoom} does not have the right xyz"
        );
    }

    #[rstest]
    // test data via https://epsg.io/transform#s_srs=4326&t_srs=3857
    #[case((0.0,0.0), (0.0,0.0))]
    #[case((30.0,0.0), (3_339_584.723_798_207,0.0))]
    #[case((-30.0,0.0), (-3_339_584.723_798_207,0.0))]
    #[case((0.0,30.0), (0.0,3_503_549.843_504_375_3))]
    #[case((0.0,-30.0), (0.0,-3_503_549.843_504_375_3))]
    #[case((38.897_957,-77.036_560), (4_330_100.766_138_651, -13_872_207.775_755_845))] // white house
    #[case((-180.0,-85.0), (-20_037_508.342_789_244, -19_971_868.880_408_566))]
    #[case((180.0,85.0), (20_037_508.342_789_244, 19_971_868.880_408_566))]
    #[case((0.026_949_458_523_585_632,0.080_848_348_740_973_67), (3000.0, 9000.0))]
    fn test_coordinate_system_conversion(#[case] wgs84: (f64, f64), #[case] webmercator: (f64, f64)) {
        // epsg produces the expected values with f32 precision, grrr..
        let epsilon = f64::from(f32::EPSILON);

        let actual_wgs84 = webmercator_to_wgs84(webmercator.0, webmercator.1);
        assert_relative_eq!(actual_wgs84.0, wgs84.0, epsilon = epsilon);
        assert_relative_eq!(actual_wgs84.1, wgs84.1, epsilon = epsilon);

        let actual_webmercator = wgs84_to_webmercator(wgs84.0, wgs84.1);
        assert_relative_eq!(actual_webmercator.0, webmercator.0, epsilon = epsilon);
        assert_relative_eq!(actual_webmercator.1, webmercator.1, epsilon = epsilon);
    }

    #[rstest]
    #[case(0..11, 0)]
    #[case(11..14, 1)]
    #[case(14..17, 2)]
    #[case(17..21, 3)]
    #[case(21..22, 4)]
    fn test_get_zoom_precision(#[case] zoom: std::ops::Range<u8>, #[case] expected_precision: usize) {
        for z in zoom {
            let actual_precision = get_zoom_precision(z);
            assert_eq!(
                actual_precision, expected_precision,
                "Zoom level {z} should have precision {expected_precision}, but was {actual_precision}"
            );
        }
    }

    #[test]
    fn test_tile_coord_zoom_range() {
        for z in 0..=MAX_ZOOM {
            assert!(TileCoord::is_possible_on_zoom_level(z, 0, 0));
            assert_eq!(
                TileCoord::new_checked(z, 0, 0),
                Some(TileCoord { z, x: 0, y: 0 })
            );
        }
        assert!(!TileCoord::is_possible_on_zoom_level(MAX_ZOOM + 1, 0, 0));
        assert_eq!(TileCoord::new_checked(MAX_ZOOM + 1, 0, 0), None);
    }

    #[test]
    fn test_tile_coord_new_checked_xy_for_zoom() {
        assert!(TileCoord::is_possible_on_zoom_level(5, 0, 0));
        assert_eq!(
            TileCoord::new_checked(5, 0, 0),
            Some(TileCoord { z: 5, x: 0, y: 0 })
        );
        assert!(TileCoord::is_possible_on_zoom_level(5, 31, 31));
        assert_eq!(
            TileCoord::new_checked(5, 31, 31),
            Some(TileCoord { z: 5, x: 31, y: 31 })
        );
        assert!(!TileCoord::is_possible_on_zoom_level(5, 31, 32));
        assert_eq!(TileCoord::new_checked(5, 31, 32), None);
        assert!(!TileCoord::is_possible_on_zoom_level(5, 32, 31));
        assert_eq!(TileCoord::new_checked(5, 32, 31), None);
    }

    #[test]
    fn xyz_format() {
        let xyz = TileCoord { z: 1, x: 2, y: 3 };
        assert_eq!(format!("{xyz}"), "1,2,3");
        assert_eq!(format!("{xyz:#}"), "1/2/3");
    }

    #[test]
    fn gzip_round_trip() {
        let data = b"some srtmhgt bytes, not really".to_vec();
        let encoded = encode_gzip(&data).expect("encode");
        let decoded = decode_gzip(&encoded).expect("decode");
        assert_eq!(decoded, data);
    }
}
