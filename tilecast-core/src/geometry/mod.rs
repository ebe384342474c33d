//! Bounds, CRS identifiers, and the resolution/zoom math shared by the
//! catalog, raster access, and transformation stages.

use geo::{HaversineDistance, Point};

use crate::error::{RenderError, RenderResult};

/// A coordinate reference system at the two boundaries this pipeline
/// actually warps between; source rasters may be in any CRS and are
/// reprojected on read, but `target_crs` is always one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    WebMercator,
    Wgs84,
}

impl Crs {
    pub const fn epsg(self) -> u32 {
        match self {
            Self::WebMercator => 3857,
            Self::Wgs84 => 4326,
        }
    }

    pub const fn is_geographic(self) -> bool {
        matches!(self, Self::Wgs84)
    }

    /// The global extent of this CRS, in its own units.
    pub const fn extent(self) -> Bounds {
        match self {
            Self::WebMercator => Bounds {
                minx: -20_037_508.342_789_244,
                miny: -20_037_508.342_789_244,
                maxx: 20_037_508.342_789_244,
                maxy: 20_037_508.342_789_244,
                crs: self,
            },
            Self::Wgs84 => Bounds {
                minx: -180.0,
                miny: -90.0,
                maxx: 180.0,
                maxy: 90.0,
                crs: self,
            },
        }
    }
}

/// `(minx, miny, maxx, maxy)` paired with a CRS. Equality is exact on the
/// four coordinates; CRS equality is by code, not by a loaded definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
    pub crs: Crs,
}

impl Bounds {
    pub const fn new(minx: f64, miny: f64, maxx: f64, maxy: f64, crs: Crs) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
            crs,
        }
    }

    pub const fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub const fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    pub const fn centroid(&self) -> (f64, f64) {
        (
            (self.minx + self.maxx) / 2.0,
            (self.miny + self.maxy) / 2.0,
        )
    }

    /// Expand on every side by `amount` in this bounds' own units. Used to
    /// apply a transformation's buffer before a mosaic read.
    pub fn buffered(&self, amount: f64) -> Self {
        Self {
            minx: self.minx - amount,
            miny: self.miny - amount,
            maxx: self.maxx + amount,
            maxy: self.maxy + amount,
            crs: self.crs,
        }
    }

    /// Clip this bounds to its CRS's global extent, reporting which sides
    /// were clamped so the caller can zero out the corresponding crop
    /// offset (mirrors the render orchestrator's buffer-at-the-edge logic).
    pub fn clamp_to_extent(&self) -> (Self, ClampedSides) {
        let extent = self.crs.extent();
        let mut out = *self;
        let mut clamped = ClampedSides::default();

        if out.minx < extent.minx {
            out.minx = extent.minx;
            clamped.left = true;
        }
        if out.maxx > extent.maxx {
            out.maxx = extent.maxx;
            clamped.right = true;
        }
        if out.miny < extent.miny {
            out.miny = extent.miny;
            clamped.bottom = true;
        }
        if out.maxy > extent.maxy {
            out.maxy = extent.maxy;
            clamped.top = true;
        }

        (out, clamped)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ClampedSides {
    pub left: bool,
    pub right: bool,
    pub bottom: bool,
    pub top: bool,
}

/// `(dx, dy)` resolution in CRS units per pixel for `bounds` rendered at
/// `(height, width)`.
pub fn resolution(bounds: &Bounds, height: u32, width: u32) -> (f64, f64) {
    (
        bounds.width() / f64::from(width),
        bounds.height() / f64::from(height),
    )
}

/// `(dx, dy)` resolution in meters per pixel. Great-circle for geographic
/// CRSes (haversine across the bounds' midlines), direct for projected
/// ones where CRS units already are meters.
pub fn resolution_in_meters(bounds: &Bounds, height: u32, width: u32) -> (f64, f64) {
    if !bounds.crs.is_geographic() {
        return resolution(bounds, height, width);
    }

    let mid_y = (bounds.miny + bounds.maxy) / 2.0;
    let mid_x = (bounds.minx + bounds.maxx) / 2.0;

    let left = Point::new(bounds.minx, mid_y);
    let right = Point::new(bounds.maxx, mid_y);
    let top = Point::new(mid_x, bounds.maxy);
    let bottom = Point::new(mid_x, bounds.miny);

    let dx = left.haversine_distance(&right) / f64::from(width);
    let dy = top.haversine_distance(&bottom) / f64::from(height);

    (dx, dy)
}

/// Converts a single point in `crs` to WGS84 `(lon, lat)`. Used to test a
/// pixel center against a mask polygon recorded in WGS84 regardless of
/// the render's own target CRS.
pub fn to_wgs84(x: f64, y: f64, crs: Crs) -> (f64, f64) {
    const R: f64 = 6_378_137.0;
    match crs {
        Crs::Wgs84 => (x, y),
        Crs::WebMercator => {
            let lon = (x / R).to_degrees();
            let lat = (2.0 * (y / R).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
            (lon, lat)
        }
    }
}

/// Web Mercator tile zoom whose nominal ground resolution (at the
/// equator, 256px tiles) is closest to `resolution_m`, rounded per `op`.
/// Clamped to `[0, 22]` per the external-interface tile-request bound.
pub fn zoom_for_resolution(resolution_m: f64, op: RoundOp) -> u8 {
    const EARTH_CIRCUMFERENCE_M: f64 = 2.0 * std::f64::consts::PI * 6_378_137.0;
    let raw = (EARTH_CIRCUMFERENCE_M / (resolution_m * 256.0)).log2();
    let rounded = match op {
        RoundOp::Round => raw.round(),
        RoundOp::Ceil => raw.ceil(),
    };
    rounded.clamp(0.0, 22.0) as u8
}

#[derive(Debug, Clone, Copy)]
pub enum RoundOp {
    Round,
    Ceil,
}

/// Validates a `(z, x, y)` tile request against the `0 ≤ z ≤ 22`,
/// `0 ≤ x,y < 2^z` bound from the external-interface section.
pub fn validate_tile(z: u8, x: u32, y: u32) -> RenderResult<()> {
    if z > 22 {
        return Err(RenderError::InvalidTileRequest(format!(
            "zoom {z} exceeds the maximum of 22"
        )));
    }
    let max = 1u32 << z;
    if x >= max || y >= max {
        return Err(RenderError::InvalidTileRequest(format!(
            "tile {z}/{x}/{y} is out of range for zoom {z} (max {max})"
        )));
    }
    Ok(())
}
