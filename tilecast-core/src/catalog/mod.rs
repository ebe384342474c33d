//! The spatial/priority-ranked source catalog: range-mode and
//! coverage-mode queries over `Source` records (§4.3).

mod memory;
pub mod recipes;

pub use memory::MemoryCatalog;
pub use recipes::RecipeDirective;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::error::RenderResult;
use crate::geometry::Bounds;

/// A catalog entry describing one source raster and how it should be
/// read and treated by the pipeline. Immutable once constructed, per the
/// data-model's "Sources are immutable post-fetch" invariant.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub name: String,
    /// Meters/pixel at the equator.
    pub resolution: f64,
    /// Logical band name (`r`/`g`/`b`/`pan`) to physical band index, or to
    /// a URL-template slot for `landsat8` sources.
    #[serde(default)]
    pub band_info: BTreeMap<String, String>,
    /// Arbitrary JSON: may carry `nodata`, `values`, `colormap`, or a
    /// Landsat MTL extract.
    #[serde(default)]
    pub meta: serde_json::Value,
    #[serde(default)]
    pub recipes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub acquired_at: Option<String>,
    /// Canvas band this source fills; `None` means "all bands".
    #[serde(default)]
    pub band: Option<usize>,
    pub priority: f64,
    /// Fraction of the requested bounds this source covers, `0.0..=1.0`.
    #[serde(default)]
    pub coverage: f64,
    #[serde(default)]
    pub geom: Option<serde_json::Value>,
    /// Optional polygon clip in WGS84; only pixels inside it contribute.
    #[serde(default)]
    pub mask: Option<serde_json::Value>,
    #[serde(default)]
    pub filename: Option<String>,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

/// Two ways to ask the catalog for candidate sources (§4.3).
#[derive(Debug, Clone, Copy)]
pub enum QueryMode {
    /// All sources whose footprint intersects `bounds` and whose zoom
    /// range overlaps `[min_zoom, max_zoom]`, ordered by
    /// `priority DESC, round(resolution) ASC, centroid-distance ASC`.
    Range { min_zoom: u8, max_zoom: u8 },
    /// A greedy cover of `bounds`: highest-scoring source first, then the
    /// next-best source whose footprint still covers uncovered area,
    /// until fully covered or no improvement remains.
    Coverage,
}

/// Abstract contract implemented by the in-memory catalog and (outside
/// this crate's scope) a relational-spatial catalog over a recursive CTE.
pub trait Catalog: std::fmt::Debug + Send + Sync {
    fn get_sources(
        &self,
        bounds: &Bounds,
        resolution_m: f64,
        mode: QueryMode,
    ) -> RenderResult<Vec<Source>>;

    fn bounds(&self) -> Bounds;
    fn min_zoom(&self) -> u8 {
        0
    }
    fn max_zoom(&self) -> u8 {
        22
    }

    /// Rejects tiles whose z/x/y fall outside this catalog's declared
    /// bounds and zoom range.
    fn validate(&self, z: u8, x: u32, y: u32, tile_bounds: &Bounds) -> RenderResult<()> {
        use crate::error::RenderError;

        if z < self.min_zoom() || z > self.max_zoom() {
            return Err(RenderError::InvalidTileRequest(format!(
                "zoom {z} outside catalog range [{}, {}]",
                self.min_zoom(),
                self.max_zoom()
            )));
        }

        let catalog_bounds = self.bounds();
        let disjoint = tile_bounds.maxx < catalog_bounds.minx
            || tile_bounds.minx > catalog_bounds.maxx
            || tile_bounds.maxy < catalog_bounds.miny
            || tile_bounds.miny > catalog_bounds.maxy;

        if disjoint {
            return Err(RenderError::InvalidTileRequest(format!(
                "tile {z}/{x}/{y} falls outside the catalog's declared bounds"
            )));
        }

        Ok(())
    }
}
