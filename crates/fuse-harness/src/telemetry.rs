//! Log output for harness runs.
//!
//! Runs are read in two places: a developer's terminal, where the compact
//! format stamps each line with the time since the harness started so
//! readiness waits are easy to follow, and CI log collectors, which receive
//! flattened JSON events with wall-clock timestamps.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::{Subscriber, debug};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt;

use fuse_harness_config::{LogFormat, Settings};

const TELEMETRY_TARGET: &str = "fuse_harness::telemetry";

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Describes the subscriber that is receiving the harness's events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
    filter: String,
}

impl TelemetryHandle {
    #[must_use]
    pub fn format(&self) -> LogFormat {
        self.format
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[source] SetGlobalDefaultError),
}

/// Installs the process-wide subscriber described by `settings`.
///
/// Only the first successful call installs anything. Later calls return the
/// handle of the subscriber already in place, whatever their settings say.
pub fn initialise(settings: &Settings) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| {
            let handle = TelemetryHandle {
                format: settings.log_format(),
                filter: settings.log_filter().to_owned(),
            };
            let filter = parse_filter(&handle.filter)?;
            tracing::subscriber::set_global_default(subscriber(filter, handle.format))
                .map_err(TelemetryError::Subscriber)?;
            debug!(
                target: TELEMETRY_TARGET,
                format = %handle.format,
                filter = %handle.filter,
                "telemetry installed"
            );
            Ok(handle)
        })
        .cloned()
}

fn parse_filter(filter: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(filter).map_err(|source| TelemetryError::Filter {
        filter: filter.to_owned(),
        source,
    })
}

fn subscriber(filter: EnvFilter, format: LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr);
    match format {
        LogFormat::Json => Box::new(
            builder
                .with_ansi(false)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .json()
                .flatten_event(true)
                .finish(),
        ),
        LogFormat::Compact => Box::new(
            builder
                .with_ansi(io::stderr().is_terminal())
                .with_timer(fmt::time::Uptime::default())
                .compact()
                .finish(),
        ),
    }
}
