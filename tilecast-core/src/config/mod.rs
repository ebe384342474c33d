//! Layered configuration (§10.3): a YAML file deserialized via `serde`,
//! with `${VAR}` substitution through `subst` against the process
//! environment (or a `FauxEnv` in tests), covering catalog backend
//! selection, thread-pool sizing, source-handle cache capacity, the
//! default transformation/format pair, and logging format.

pub mod env;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use env::Env;

/// Which catalog backend to construct at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogBackend {
    /// An in-memory fixture loaded from a sources file.
    Memory { sources_path: String },
    /// A relational-spatial catalog. Building one is outside this
    /// crate's scope, but the variant lets config files name the
    /// backend without the core crate depending on a SQL driver.
    Postgres { connection_string: String },
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// The transformation/format pair a render should fall back to when a
/// request doesn't name one explicitly. This crate's config layer only
/// carries the chosen name — `Transformation`/`Format` are trait objects
/// with no registry here, so resolving the name to an impl is the
/// embedder's job.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DefaultTransformation {
    #[default]
    Image,
    Greyscale,
    Hillshade,
    Normal,
    Terrarium,
    Colormap,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DefaultFormat {
    #[default]
    Png,
    Jpeg,
    Optimal,
    ColorRamp,
    GeoTiff,
    Skadi,
}

const fn default_cache_capacity() -> u64 {
    256
}

const fn default_thread_pool_multiplier() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub catalog: CatalogBackend,
    /// Thread-pool size as a multiple of available parallelism (§5:
    /// default ≈5×).
    #[serde(default = "default_thread_pool_multiplier")]
    pub thread_pool_multiplier: usize,
    #[serde(default = "default_cache_capacity")]
    pub source_handle_cache_capacity: u64,
    #[serde(default)]
    pub default_transformation: DefaultTransformation,
    #[serde(default)]
    pub default_format: DefaultFormat,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Config {
    /// Parses `yaml`, substituting `${VAR}` references against `env`
    /// before deserializing.
    pub fn from_yaml_str<'a, E: Env<'a>>(yaml: &str, env: &'a E) -> RenderResult<Self> {
        let substituted =
            subst::substitute(yaml, env).map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;
        serde_yaml::from_str(&substituted)
            .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))
    }

    pub fn from_file<'a, E: Env<'a>>(path: &Path, env: &'a E) -> RenderResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| RenderError::Internal(anyhow::anyhow!(err)))?;
        Self::from_yaml_str(&raw, env)
    }

    /// Thread-pool size per §5: ≈`thread_pool_multiplier`× available
    /// parallelism, floored at 1.
    pub fn thread_pool_size(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        (cores * self.thread_pool_multiplier).max(1)
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;
    use env::FauxEnv;

    #[test]
    fn substitutes_env_vars_before_parsing() {
        let env = FauxEnv(
            [("SOURCES_PATH", OsString::from("/data/sources.json"))]
                .into_iter()
                .collect(),
        );
        let yaml = "catalog:\n  kind: memory\n  sources_path: \"${SOURCES_PATH}\"\n";

        let config = Config::from_yaml_str(yaml, &env).unwrap();
        match config.catalog {
            CatalogBackend::Memory { sources_path } => {
                assert_eq!(sources_path, "/data/sources.json");
            }
            CatalogBackend::Postgres { .. } => panic!("wrong backend"),
        }
        assert_eq!(config.source_handle_cache_capacity, 256);
    }

    #[test]
    fn thread_pool_size_scales_with_multiplier() {
        let env = FauxEnv::default();
        let yaml = "catalog:\n  kind: memory\n  sources_path: x\nthread_pool_multiplier: 2\n";

        let config = Config::from_yaml_str(yaml, &env).unwrap();
        assert_eq!(config.thread_pool_multiplier, 2);
        assert!(config.thread_pool_size() >= 2);
    }

    #[test]
    fn missing_env_var_fails_substitution() {
        let env = FauxEnv::default();
        let yaml = "catalog:\n  kind: memory\n  sources_path: \"${MISSING}\"\n";
        assert!(Config::from_yaml_str(yaml, &env).is_err());
    }
}
