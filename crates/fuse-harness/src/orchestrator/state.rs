//! States of a harness run.

use std::fmt;

/// Stage an orchestration run is in.
///
/// `Deploying` and `Verifying` carry the zero-based index of the unit being
/// processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Preparing,
    ProcessStarting,
    AwaitingProcessReady,
    AwaitingManagementReady,
    Configuring,
    InstallingFeatures,
    Deploying(usize),
    Verifying(usize),
    Complete,
    Failing,
    ShutdownInvoked,
    Failed,
}

impl LifecycleState {
    /// Returns `true` once the run can make no further progress.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Preparing => f.write_str("preparing"),
            Self::ProcessStarting => f.write_str("process_starting"),
            Self::AwaitingProcessReady => f.write_str("awaiting_process_ready"),
            Self::AwaitingManagementReady => f.write_str("awaiting_management_ready"),
            Self::Configuring => f.write_str("configuring"),
            Self::InstallingFeatures => f.write_str("installing_features"),
            Self::Deploying(index) => write!(f, "deploying[{index}]"),
            Self::Verifying(index) => write!(f, "verifying[{index}]"),
            Self::Complete => f.write_str("complete"),
            Self::Failing => f.write_str("failing"),
            Self::ShutdownInvoked => f.write_str("shutdown_invoked"),
            Self::Failed => f.write_str("failed"),
        }
    }
}
