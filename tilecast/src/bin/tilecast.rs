//! A thin CLI: load a config, render one tile (or Skadi elevation tile),
//! write the encoded bytes to stdout or a file. No routing, no server loop —
//! that boundary belongs to an external HTTP shim.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tilecast::config::build_catalog;
use tilecast::logging::LogFormat;
use tilecast::{CliError, CliResult};
use tilecast_core::config::{Config, DefaultFormat, DefaultTransformation};
use tilecast_core::config::env::OsEnv;
use tilecast_core::format::{ColorRamp, Format, GeoTiff, Jpeg, Optimal, Png, Skadi as SkadiFormat};
use tilecast_core::catalog::QueryMode;
use tilecast_core::raster::HandleCache;
use tilecast_core::transform::{Greyscale, Hillshade, Image, Normal, Terrarium, Transformation};
use tilecast_core::{render_skadi, render_tile};

#[derive(Parser, Debug)]
#[command(name = "tilecast", version, about = "Render one tile from an on-demand raster catalog")]
struct Cli {
    /// Path to the YAML config file (catalog backend, thread pool sizing, defaults).
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// Where to write the rendered bytes. Defaults to stdout.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// RUST_LOG-style filter string.
    #[arg(long, default_value = "info")]
    log_filter: String,

    #[command(subcommand)]
    request: Request,
}

#[derive(Subcommand, Debug)]
enum Request {
    /// Render a Web Mercator (z, x, y) tile.
    Tile(TileArgs),
    /// Render a 1°x1° Skadi (SRTMHGT) elevation tile, e.g. `N38W123`.
    Skadi(SkadiArgs),
}

#[derive(Args, Debug)]
struct TileArgs {
    z: u8,
    x: u32,
    y: u32,
    /// Output pixel scale multiplier (tile side = 256 * scale).
    #[arg(long, default_value_t = 1)]
    scale: u32,
    /// Query the catalog's full zoom-banded range instead of the default
    /// greedy coverage cover.
    #[arg(long)]
    full_range: bool,
}

#[derive(Args, Debug)]
struct SkadiArgs {
    /// Tile name, e.g. `N38W123`.
    name: String,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let env = OsEnv::default();
    let config = Config::from_file(&cli.config, &env)
        .map_err(|err| CliError::Config(err.to_string()))?;

    LogFormat::from(config.log_format).init(&cli.log_filter);

    // Best-effort: a second render within the same process (tests, an
    // embedder calling `run` more than once) would hit an already-built
    // global pool, which is not an error worth surfacing.
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(config.thread_pool_size())
        .build_global();

    let base_dir = cli
        .config
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let catalog = build_catalog(&config.catalog, &base_dir)?;

    let handle_cache = HandleCache::new(config.source_handle_cache_capacity);
    let transformation = default_transformation(config.default_transformation);
    let format = default_format(config.default_format);

    let tile = match cli.request {
        Request::Tile(args) => render_tile(
            args.z,
            args.x,
            args.y,
            catalog.as_ref(),
            transformation.as_deref(),
            format.as_ref(),
            args.scale,
            true,
            &handle_cache,
            if args.full_range {
                Some(QueryMode::Range { min_zoom: 0, max_zoom: 22 })
            } else {
                None
            },
        )?,
        Request::Skadi(args) => {
            render_skadi(&args.name, catalog.as_ref(), format.as_ref(), &handle_cache)?
        }
    };

    tracing::info!(
        content_type = tile.content_type,
        bytes = tile.bytes.len(),
        server_timing = %tile.server_timing(),
        "rendered tile"
    );

    match cli.output {
        Some(path) => std::fs::write(&path, &tile.bytes)?,
        None => std::io::stdout().write_all(&tile.bytes)?,
    }

    Ok(())
}

/// Resolves the config's named default transformation to a boxed impl.
/// `Colormap` needs a palette LUT this thin driver has no fixture format
/// for, so it isn't offered here; an embedder wiring its own LUT source
/// can call `tilecast_core::render` directly instead of this CLI.
fn default_transformation(name: DefaultTransformation) -> Option<Box<dyn Transformation>> {
    match name {
        DefaultTransformation::Image => Some(Box::new(Image)),
        DefaultTransformation::Greyscale => Some(Box::new(Greyscale)),
        DefaultTransformation::Hillshade => Some(Box::new(Hillshade::default())),
        DefaultTransformation::Normal => Some(Box::new(Normal)),
        DefaultTransformation::Terrarium => Some(Box::new(Terrarium)),
        DefaultTransformation::Colormap => None,
    }
}

fn default_format(name: DefaultFormat) -> Box<dyn Format> {
    match name {
        DefaultFormat::Png => Box::new(Png),
        DefaultFormat::Jpeg => Box::new(Jpeg),
        DefaultFormat::Optimal => Box::new(Optimal),
        DefaultFormat::ColorRamp => Box::new(ColorRamp::default()),
        DefaultFormat::GeoTiff => Box::new(GeoTiff),
        DefaultFormat::Skadi => Box::new(SkadiFormat),
    }
}
