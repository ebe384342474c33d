//! GDAL's `/vsimem/` virtual filesystem lets a driver write a "file" that
//! never touches disk; this is how both georeferenced formats (GeoTIFF,
//! Skadi) round-trip GDAL's `Create`-based writers into an in-memory byte
//! buffer, mirroring the predecessor's `rasterio.io.MemoryFile`.

use std::ffi::CString;
use std::sync::atomic::{AtomicU64, Ordering};

use gdal_sys::{VSIGetMemFileBuffer, VSIUnlink};

use crate::error::{RenderError, RenderResult};

/// A process-wide counter for unique `/vsimem/` paths, so two tiles
/// encoded concurrently never collide on the same virtual filename.
pub fn next_vsimem_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Reads back the bytes GDAL wrote to `path` (a `/vsimem/...` path) and
/// frees the virtual file. Must run after the `Dataset` that wrote it has
/// been dropped, since GDAL only flushes on close.
pub fn read_back_and_unlink(path: &str) -> RenderResult<Vec<u8>> {
    let c_path =
        CString::new(path).map_err(|err| RenderError::InternalInvariant(err.to_string()))?;

    let mut len: u64 = 0;
    // SAFETY: `c_path` outlives the call. `bUnlinkAndSeize = 0` means GDAL
    // keeps ownership of the buffer, so we copy it out rather than free it,
    // then unlink separately to release GDAL's copy.
    let ptr = unsafe { VSIGetMemFileBuffer(c_path.as_ptr(), &raw mut len, 0) };
    if ptr.is_null() {
        return Err(RenderError::InternalInvariant(format!(
            "no vsimem buffer found at {path}"
        )));
    }

    // SAFETY: `ptr`/`len` describe a buffer GDAL owns until we unlink it
    // below; copying before unlinking avoids a dangling read.
    let bytes = unsafe { std::slice::from_raw_parts(ptr, len as usize) }.to_vec();

    // SAFETY: `c_path` is a valid, NUL-terminated path GDAL itself created.
    unsafe {
        VSIUnlink(c_path.as_ptr());
    }

    Ok(bytes)
}
