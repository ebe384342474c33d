//! Raster source access: opening remote/local rasters, reading warped
//! windows with masks, and caching handles.

mod handle_cache;
mod read;

pub use handle_cache::HandleCache;
pub use read::{open_dataset, read_window, Resample};
