//! Tracing setup shared by binaries.

use crate::{Error, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log output format, picked with `CONTRIB_LOG_FORMAT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }

    pub fn from_env() -> Result<Self> {
        match std::env::var("CONTRIB_LOG_FORMAT") {
            Ok(v) if !v.trim().is_empty() => Self::parse(&v)
                .ok_or_else(|| Error::InvalidInput(format!("invalid CONTRIB_LOG_FORMAT: {v}"))),
            _ => Ok(Self::default()),
        }
    }
}

/// Installs the global subscriber: `RUST_LOG` filter (default `info`), output on stderr.
pub fn init_global_from_env() -> Result<()> {
    init_global(LogFormat::from_env()?)
}

pub fn init_global(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .try_init()
        .map_err(|e| Error::InvalidInput(format!("tracing already initialized: {e}")))
}
