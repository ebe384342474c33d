#![doc = include_str!("../README.md")]
#![deny(missing_debug_implementations)]

//! `warped_vrt` drops to `gdal-sys` FFI for the one warp option GDAL's safe
//! bindings don't expose yet, so this crate can't be `forbid(unsafe_code)`.

pub mod catalog;
pub mod config;
mod error;
pub mod format;
pub mod geometry;
pub mod mosaic;
pub mod pixels;
pub mod raster;
mod render;
mod tile;
pub mod transform;

pub use error::{RenderError, RenderResult};
pub use render::{render, render_skadi, render_tile, SourceInput};
pub use tile::RenderedTile;
