use thiserror::Error;

pub type CliResult<T> = Result<T, CliError>;

/// Errors the CLI driver can surface, on top of whatever
/// [`tilecast_core::RenderError`] a render call raises.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load configuration: {0}")]
    Config(String),

    #[error("failed to load catalog: {0}")]
    CatalogLoad(String),

    #[error("render failed: {0}")]
    Render(#[from] tilecast_core::RenderError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
