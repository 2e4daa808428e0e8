//! Structured reporting for orchestration lifecycle events.

use std::sync::Arc;
use std::time::Duration;

use fuse_harness_config::DeploymentUnit;

use crate::management::{UnitId, UnitStatusRecord};
use crate::orchestrator::{LifecycleState, OrchestrationError, ReadinessTarget};
use crate::process::ProcessHandle;

const LIFECYCLE_TARGET: &str = "fuse_harness::lifecycle";

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked on every state transition.
    fn state_changed(&self, from: LifecycleState, to: LifecycleState);

    /// Invoked after the start command was launched.
    fn process_started(&self, handle: ProcessHandle);

    /// Invoked when a readiness poll succeeds.
    fn readiness_reached(&self, target: &ReadinessTarget, attempts: u32, elapsed: Duration);

    /// Invoked after a named feature was installed.
    fn feature_installed(&self, feature: &str);

    /// Invoked after a unit was installed.
    fn unit_installed(&self, unit: &DeploymentUnit, id: UnitId);

    /// Invoked after a unit passed verification.
    fn unit_verified(&self, record: &UnitStatusRecord);

    /// Invoked once with the error that ends a failed run.
    fn run_failed(&self, error: &OrchestrationError);

    /// Invoked once when every unit was deployed.
    fn run_completed(&self, units: usize);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn state_changed(&self, from: LifecycleState, to: LifecycleState) {
        (**self).state_changed(from, to);
    }

    fn process_started(&self, handle: ProcessHandle) {
        (**self).process_started(handle);
    }

    fn readiness_reached(&self, target: &ReadinessTarget, attempts: u32, elapsed: Duration) {
        (**self).readiness_reached(target, attempts, elapsed);
    }

    fn feature_installed(&self, feature: &str) {
        (**self).feature_installed(feature);
    }

    fn unit_installed(&self, unit: &DeploymentUnit, id: UnitId) {
        (**self).unit_installed(unit, id);
    }

    fn unit_verified(&self, record: &UnitStatusRecord) {
        (**self).unit_verified(record);
    }

    fn run_failed(&self, error: &OrchestrationError) {
        (**self).run_failed(error);
    }

    fn run_completed(&self, units: usize) {
        (**self).run_completed(units);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn state_changed(&self, from: LifecycleState, to: LifecycleState) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "state_changed",
            from = %from,
            to = %to,
            "lifecycle state changed"
        );
    }

    fn process_started(&self, handle: ProcessHandle) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "process_started",
            pid = handle.pid,
            "container process launched"
        );
    }

    fn readiness_reached(&self, target: &ReadinessTarget, attempts: u32, elapsed: Duration) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "readiness_reached",
            what = %target,
            attempts,
            elapsed_ms = elapsed.as_millis(),
            "readiness reached"
        );
    }

    fn feature_installed(&self, feature: &str) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "feature_installed",
            feature,
            "feature installed"
        );
    }

    fn unit_installed(&self, unit: &DeploymentUnit, id: UnitId) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "unit_installed",
            artifact = %unit.path(),
            id = id.0,
            "unit installed"
        );
    }

    fn unit_verified(&self, record: &UnitStatusRecord) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "unit_verified",
            id = record.id.0,
            name = %record.name,
            version = %record.version,
            state = record.core_state.as_deref().unwrap_or_default(),
            "unit verified"
        );
    }

    fn run_failed(&self, error: &OrchestrationError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "run_failed",
            error = %error,
            "orchestration failed"
        );
    }

    fn run_completed(&self, units: usize) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "run_completed",
            units = units as u64,
            "orchestration complete"
        );
    }
}
