//! Client side of the container's remote management endpoint.
//!
//! The [`ManagementClient`] trait is the seam the orchestrator drives; the
//! production implementation, [`JolokiaClient`], talks to the container's
//! HTTP/JSON management bridge.

mod jolokia;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

pub use jolokia::JolokiaClient;

/// Identifier the container assigns to an installed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Optional sub-frameworks that may report their own per-unit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subsystem {
    /// Blueprint context assembly.
    Blueprint,
    /// Spring dependency injection.
    Spring,
}

impl Subsystem {
    pub const ALL: [Self; 2] = [Self::Blueprint, Self::Spring];

    /// Column carrying this sub-framework's state in the unit listing.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Blueprint => "Blueprint",
            Self::Spring => "Spring",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Runtime status of one installed unit.
///
/// A sub-framework appears in `subsystems` only when the endpoint reported
/// its column for the unit; the value may be blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatusRecord {
    pub id: UnitId,
    pub name: String,
    pub version: String,
    pub core_state: Option<String>,
    pub subsystems: BTreeMap<Subsystem, String>,
}

impl UnitStatusRecord {
    #[must_use]
    pub fn new(id: UnitId, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
            core_state: None,
            subsystems: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_core_state(mut self, state: impl Into<String>) -> Self {
        self.core_state = Some(state.into());
        self
    }

    #[must_use]
    pub fn with_subsystem(mut self, subsystem: Subsystem, state: impl Into<String>) -> Self {
        self.subsystems.insert(subsystem, state.into());
        self
    }

    #[must_use]
    pub fn subsystem_state(&self, subsystem: Subsystem) -> Option<&str> {
        self.subsystems.get(&subsystem).map(String::as_str)
    }
}

/// Failures talking to the management bridge, below the operation level.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("management bridge answered HTTP {0}")]
    HttpStatus(u16),
    #[error("management operation failed with status {status} ({error_type}): {message}")]
    Remote {
        status: u16,
        error_type: String,
        message: String,
    },
    #[error("cannot express '{0}' as a file URL")]
    ArtifactUrl(Utf8PathBuf),
    #[error("unexpected management response: {0}")]
    Malformed(String),
}

/// Errors surfaced by [`ManagementClient`] operations.
#[derive(Debug, Error)]
pub enum ManagementError {
    #[error("management endpoint {url} is unavailable: {source}")]
    Unavailable {
        url: String,
        #[source]
        source: BridgeError,
    },
    #[error("failed to install '{artifact}': {source}")]
    Install {
        artifact: Utf8PathBuf,
        #[source]
        source: BridgeError,
    },
    #[error("unit {id} is not listed by the container")]
    UnitNotFound { id: UnitId },
    #[error("failed to query the status of unit {id}: {source}")]
    Status {
        id: UnitId,
        #[source]
        source: BridgeError,
    },
    #[error("management operation '{operation}' failed: {source}")]
    Operation {
        operation: String,
        #[source]
        source: BridgeError,
    },
}

/// Operations the orchestrator needs from the container's management endpoint.
///
/// Every call is independent: implementations hold no session between calls.
pub trait ManagementClient {
    /// Performs the management handshake, failing with
    /// [`ManagementError::Unavailable`] until the endpoint answers.
    fn connect(&self, timeout: Duration) -> Result<(), ManagementError>;

    /// Installs and starts the artifact at `artifact`.
    fn install(&self, artifact: &Utf8Path) -> Result<UnitId, ManagementError>;

    /// Returns the current status of an installed unit.
    fn status(&self, unit: UnitId) -> Result<UnitStatusRecord, ManagementError>;

    /// Invokes a named operation, such as `installFeature`, with string
    /// arguments. The resulting container state is not validated.
    fn invoke_named_operation(&self, name: &str, args: &[String]) -> Result<(), ManagementError>;
}
