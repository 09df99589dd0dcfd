//! Logging setup of the command line tool, using `tracing` and `tracing-subscriber`.
//!
//! The level is controlled with [`EnvFilter`] through `RUST_LOG`, the output with [`LogFormat`].

use std::io::stderr;
use std::str::FromStr;

use tracing::dispatcher::{SetGlobalDefaultError, set_global_default};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "gpkg_mosaic=info,geopackage=info";

/// Log output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, single-line logs
    Full,
    /// A variant of the full format, optimized for short line lengths
    #[default]
    Compact,
    /// Without timestamps, targets or ANSI colors
    Bare,
    /// Multi-line logs for debugging
    Pretty,
    /// Newline-delimited JSON
    Json,
}

impl LogFormat {
    /// Install a global subscriber that writes to stderr, so that stdout stays usable for output.
    pub fn init(self, env_filter: EnvFilter) -> Result<(), SetGlobalDefaultError> {
        let builder = tracing_subscriber::fmt()
            .with_writer(stderr)
            .with_span_events(FmtSpan::NONE)
            .with_env_filter(env_filter);
        let dispatch = match self {
            Self::Full => builder.finish().into(),
            Self::Compact => builder.compact().finish().into(),
            Self::Bare => builder
                .compact()
                .without_time()
                .with_target(false)
                .with_ansi(false)
                .finish()
                .into(),
            Self::Pretty => builder.pretty().finish().into(),
            Self::Json => builder.json().finish().into(),
        };
        set_global_default(dispatch)
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "compact" => Ok(Self::Compact),
            "bare" => Ok(Self::Bare),
            "pretty" | "verbose" => Ok(Self::Pretty),
            "json" | "jsonl" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: json, full, compact, bare or pretty"
            )),
        }
    }
}

/// Filter from `RUST_LOG`, or [`DEFAULT_LOG_FILTER`] if it is unset or invalid.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
