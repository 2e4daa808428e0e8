//! Terminal errors of a harness run.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::configure::ConfigurationError;
use crate::management::{ManagementError, UnitId};
use crate::process::ProcessError;
use crate::verifier::VerificationError;

/// Boxed error kept as the last observation of a readiness poll.
pub type ProbeFailure = Box<dyn Error + Send + Sync + 'static>;

/// What a readiness poll was waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessTarget {
    /// The status command reporting the running marker.
    Process,
    /// The management port and handshake.
    Management,
    /// An extra named TCP endpoint.
    Named(String),
}

impl fmt::Display for ReadinessTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process => f.write_str("the container process"),
            Self::Management => f.write_str("the management endpoint"),
            Self::Named(name) => write!(f, "readiness check '{name}'"),
        }
    }
}

/// The single error a failed run surfaces.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("failed to launch the container: {0}")]
    ProcessLaunch(#[source] ProcessError),
    #[error(
        "timed out after {} ms waiting for {what} ({attempts} attempts)",
        .elapsed.as_millis()
    )]
    ReadinessTimeout {
        what: ReadinessTarget,
        attempts: u32,
        elapsed: Duration,
        #[source]
        last_error: Option<ProbeFailure>,
    },
    #[error("container configuration failed: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("failed to install '{unit}': {source}")]
    Install {
        unit: Utf8PathBuf,
        #[source]
        source: ManagementError,
    },
    #[error("unit {id} installed from '{unit}' is not listed by the container")]
    UnitNotFound { unit: Utf8PathBuf, id: UnitId },
    #[error("failed to query the status of '{unit}': {source}")]
    Status {
        unit: Utf8PathBuf,
        #[source]
        source: ManagementError,
    },
    #[error("deployment verification failed: {0}")]
    Verification(#[from] VerificationError),
    #[error("failed to install feature '{feature}': {source}")]
    Operation {
        feature: String,
        #[source]
        source: ManagementError,
    },
    #[error("this orchestrator has already run")]
    AlreadyRun,
}

impl OrchestrationError {
    /// Splits a status-query failure into "unit missing" and "query failed".
    pub(crate) fn from_status(unit: Utf8PathBuf, error: ManagementError) -> Self {
        match error {
            ManagementError::UnitNotFound { id } => Self::UnitNotFound { unit, id },
            source => Self::Status { unit, source },
        }
    }
}
