//! Logging initialization using `tracing` and `tracing-subscriber`.
//!
//! Output format is controlled by [`LogFormat`]; level filtering follows the
//! standard `tracing-subscriber` `EnvFilter` behavior (`RUST_LOG`).

use std::str::FromStr;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, single-line logs.
    Compact,

    /// Excessively pretty, multi-line logs for local development/debugging.
    Pretty,

    /// Newline-delimited (structured) JSON logs.
    Json,
}

impl LogFormat {
    /// Initialize the global tracing subscriber for the given filter and format.
    pub fn init(self, filter: &str) {
        let env_filter = EnvFilter::from_str(filter).unwrap_or_else(|_| {
            eprintln!("Warning: invalid filter string '{filter}', falling back to 'info'");
            EnvFilter::new("info")
        });

        let dispatch = match self {
            LogFormat::Compact => tracing_subscriber::fmt()
                .compact()
                .with_span_events(FmtSpan::NONE)
                .with_env_filter(env_filter)
                .finish()
                .into(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(env_filter)
                .finish()
                .into(),
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_span_events(FmtSpan::NONE)
                .with_env_filter(env_filter)
                .finish()
                .into(),
        };
        tracing::dispatcher::set_global_default(dispatch)
            .expect("failed to set global default subscriber");
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

impl From<tilecast_core::config::LogFormat> for LogFormat {
    fn from(value: tilecast_core::config::LogFormat) -> Self {
        match value {
            tilecast_core::config::LogFormat::Pretty => Self::Pretty,
            tilecast_core::config::LogFormat::Json => Self::Json,
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" | "verbose" => Ok(Self::Pretty),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: compact, pretty, json"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_format_names() {
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("jsonl".parse::<LogFormat>().unwrap(), LogFormat::Json);
    }

    #[test]
    fn rejects_unknown_format_name() {
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn converts_from_config_log_format() {
        assert_eq!(
            LogFormat::from(tilecast_core::config::LogFormat::Json),
            LogFormat::Json
        );
    }
}
