//! Logging initialization for gatewatch-daemon.
//!
//! Builds the global `tracing-subscriber` from the `[general]` section of
//! `GatewatchConfig` (after CLI overrides have been applied).
//!
//! The collector logs once per datagram at `debug`. At a busy appliance
//! that drowns everything else, so the per-datagram targets stay at
//! `info` unless the configured level is `trace`.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use gatewatch_core::config::GeneralConfig;

/// Targets that emit one event per received datagram.
const PER_DATAGRAM_TARGETS: &[&str] = &[
    "gatewatch_log_pipeline::collector",
    "gatewatch_log_pipeline::broadcast",
];

/// Output format of the daemon's log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for log shippers.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            )),
        }
    }
}

/// Filter directives for a configured level.
///
/// The per-datagram targets are capped at `info` below `trace`.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    if level == "trace" {
        return level;
    }

    let mut directives = vec![level];
    directives.extend(
        PER_DATAGRAM_TARGETS
            .iter()
            .map(|target| format!("{target}=info")),
    );
    directives.join(",")
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` replaces the configured directives entirely.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.log_level))
            .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_ansi(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))
}
