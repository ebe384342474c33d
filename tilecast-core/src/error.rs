use thiserror::Error;

/// Result alias used throughout the render pipeline.
pub type RenderResult<T> = Result<T, RenderError>;

/// The five error kinds the render pipeline can surface, plus a catch-all
/// `Internal` variant for anything that doesn't fit the taxonomy. Kept
/// free of any HTTP-framework type: status-code mapping is an external
/// shim's job, not this crate's.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A `(z, x, y)` or Skadi tile name fell outside the catalog's declared
    /// bounds/zoom range, or failed basic shape validation.
    #[error("invalid tile request: {0}")]
    InvalidTileRequest(String),

    /// The catalog returned no sources intersecting the requested bounds,
    /// or every source read failed and no pixels were laid down.
    #[error("no data available for the requested bounds")]
    NoDataAvailable,

    /// `render()` was called without either a catalog or an explicit
    /// source list.
    #[error("no catalog or source list was provided")]
    NoCatalogAvailable,

    /// A single source failed to open or read. Per §7, the orchestrator
    /// logs and skips these; they only escalate to `NoDataAvailable` when
    /// no source in the mosaic succeeds.
    #[error("failed to read source {url}")]
    DataReadFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A paste-contract mismatch (bounds/CRS/shape/dtype) between canvas
    /// and window. These indicate a caller bug, not bad external data, and
    /// are the one kind this crate treats as a programmer error.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Anything else: config/deserialize failures, GDAL driver errors
    /// outside of a specific source read, etc.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RenderError {
    pub fn data_read_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DataReadFailed {
            url: url.into(),
            source: Box::new(source),
        }
    }
}
