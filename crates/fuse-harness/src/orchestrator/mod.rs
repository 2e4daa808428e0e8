//! Deployment verification state machine.
//!
//! [`LifecycleOrchestrator::run`] prepares the container home, starts the
//! container, waits for the process and management endpoint to become ready,
//! applies configuration, installs features and then installs and verifies
//! each deployment unit in order. The first error ends the run. If the
//! container process had been started, it is shut down exactly once before the
//! error is returned.

mod error;
mod state;

use std::time::{Duration, Instant};

use fuse_harness_config::{DeploymentUnit, OrchestrationConfig};

use crate::configure::ContainerHome;
use crate::management::ManagementClient;
use crate::poller::{PollOutcome, poll_until};
use crate::process::{ProcessController, reports_running};
use crate::reporter::LifecycleReporter;
use crate::socket::probe_tcp;
use crate::verifier::verify;

pub use error::{OrchestrationError, ProbeFailure, ReadinessTarget};
pub use state::LifecycleState;

const INSTALL_FEATURE_OPERATION: &str = "installFeature";
const MIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(100);

/// Drives one harness run against injected collaborators.
pub struct LifecycleOrchestrator<P, M, R> {
    config: OrchestrationConfig,
    process: P,
    management: M,
    reporter: R,
    state: LifecycleState,
    history: Vec<LifecycleState>,
    process_started: bool,
    home: Option<ContainerHome>,
}

impl<P, M, R> LifecycleOrchestrator<P, M, R>
where
    P: ProcessController,
    M: ManagementClient,
    R: LifecycleReporter,
{
    #[must_use]
    pub fn new(config: OrchestrationConfig, process: P, management: M, reporter: R) -> Self {
        Self {
            config,
            process,
            management,
            reporter,
            state: LifecycleState::Idle,
            history: vec![LifecycleState::Idle],
            process_started: false,
            home: None,
        }
    }

    /// Current state of the run.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every state entered so far, starting with [`LifecycleState::Idle`].
    #[must_use]
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    /// Executes the run.
    ///
    /// An orchestrator runs once; later calls return
    /// [`OrchestrationError::AlreadyRun`] without touching any collaborator.
    pub fn run(&mut self) -> Result<(), OrchestrationError> {
        if self.state != LifecycleState::Idle {
            return Err(OrchestrationError::AlreadyRun);
        }
        match self.drive() {
            Ok(()) => {
                self.transition(LifecycleState::Complete);
                self.reporter.run_completed(self.config.units.len());
                Ok(())
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    fn drive(&mut self) -> Result<(), OrchestrationError> {
        self.transition(LifecycleState::Preparing);
        self.prepare()?;

        self.transition(LifecycleState::ProcessStarting);
        let handle = self
            .process
            .start()
            .map_err(OrchestrationError::ProcessLaunch)?;
        self.process_started = true;
        self.reporter.process_started(handle);

        self.transition(LifecycleState::AwaitingProcessReady);
        self.await_process()?;

        self.transition(LifecycleState::AwaitingManagementReady);
        self.await_management()?;
        self.await_named_checks()?;

        self.transition(LifecycleState::Configuring);
        self.configure()?;

        self.transition(LifecycleState::InstallingFeatures);
        self.install_features()?;

        let units = self.config.units.clone();
        for (index, unit) in units.iter().enumerate() {
            self.deploy(index, unit)?;
        }
        Ok(())
    }

    /// Single failure path: reports the error and shuts the container down
    /// once if it was started. A run that never started a process still
    /// passes through [`LifecycleState::ShutdownInvoked`], with nothing to
    /// stop.
    fn fail(&mut self, error: OrchestrationError) -> OrchestrationError {
        self.reporter.run_failed(&error);
        if self.process_started {
            self.transition(LifecycleState::Failing);
            self.process.shutdown();
        }
        self.transition(LifecycleState::ShutdownInvoked);
        self.transition(LifecycleState::Failed);
        error
    }

    fn transition(&mut self, next: LifecycleState) {
        let previous = self.state;
        self.state = next;
        self.history.push(next);
        self.reporter.state_changed(previous, next);
    }

    fn container_home(&mut self) -> Result<&ContainerHome, OrchestrationError> {
        let home = match self.home.take() {
            Some(home) => home,
            None => ContainerHome::open(&self.config.home)?,
        };
        Ok(&*self.home.insert(home))
    }

    fn prepare(&mut self) -> Result<(), OrchestrationError> {
        if self.config.enable_admin_user {
            self.container_home()?.enable_admin_user()?;
        }
        Ok(())
    }

    fn await_process(&mut self) -> Result<(), OrchestrationError> {
        let marker = self.config.running_marker.as_str();
        let process = &mut self.process;
        let outcome = poll_until(
            || {
                process
                    .status()
                    .map(|output| reports_running(&output, marker))
                    .map_err(ProbeFailure::from)
            },
            self.config.start_timeout,
            self.config.poll_interval,
        );
        self.settle(ReadinessTarget::Process, outcome)
    }

    fn await_management(&mut self) -> Result<(), OrchestrationError> {
        let endpoint = &self.config.management;
        let management = &self.management;
        let deadline = Instant::now() + self.config.management_timeout;
        let outcome = poll_until(
            || -> Result<bool, ProbeFailure> {
                probe_tcp(&endpoint.host, endpoint.port)?;
                let remaining = deadline.saturating_duration_since(Instant::now());
                management.connect(remaining.max(MIN_HANDSHAKE_TIMEOUT))?;
                Ok(true)
            },
            self.config.management_timeout,
            self.config.poll_interval,
        );
        self.settle(ReadinessTarget::Management, outcome)
    }

    fn await_named_checks(&mut self) -> Result<(), OrchestrationError> {
        let checks = self.config.readiness_checks.clone();
        for check in checks {
            let host = self.config.management.host.as_str();
            let outcome = poll_until(
                || {
                    probe_tcp(host, check.port)
                        .map(|_| true)
                        .map_err(ProbeFailure::from)
                },
                self.config.management_timeout,
                self.config.poll_interval,
            );
            self.settle(ReadinessTarget::Named(check.name), outcome)?;
        }
        Ok(())
    }

    fn settle(
        &self,
        what: ReadinessTarget,
        outcome: PollOutcome<ProbeFailure>,
    ) -> Result<(), OrchestrationError> {
        match outcome {
            PollOutcome::Success { attempts, elapsed } => {
                self.reporter.readiness_reached(&what, attempts, elapsed);
                Ok(())
            }
            PollOutcome::TimedOut {
                attempts,
                elapsed,
                last_error,
            } => Err(OrchestrationError::ReadinessTimeout {
                what,
                attempts,
                elapsed,
                last_error,
            }),
        }
    }

    fn configure(&mut self) -> Result<(), OrchestrationError> {
        if self.config.configuration.is_empty() {
            return Ok(());
        }
        let operations = self.config.configuration.clone();
        let home = self.container_home()?;
        for operation in &operations {
            home.apply(operation)?;
        }
        Ok(())
    }

    fn install_features(&mut self) -> Result<(), OrchestrationError> {
        for feature in &self.config.features {
            self.management
                .invoke_named_operation(INSTALL_FEATURE_OPERATION, std::slice::from_ref(feature))
                .map_err(|source| OrchestrationError::Operation {
                    feature: feature.clone(),
                    source,
                })?;
            self.reporter.feature_installed(feature);
        }
        Ok(())
    }

    fn deploy(&mut self, index: usize, unit: &DeploymentUnit) -> Result<(), OrchestrationError> {
        self.transition(LifecycleState::Deploying(index));
        let id = self
            .management
            .install(unit.path())
            .map_err(|source| OrchestrationError::Install {
                unit: unit.path().to_path_buf(),
                source,
            })?;
        self.reporter.unit_installed(unit, id);
        if !unit.require_verification() {
            return Ok(());
        }

        self.transition(LifecycleState::Verifying(index));
        let record = self
            .management
            .status(id)
            .map_err(|error| OrchestrationError::from_status(unit.path().to_path_buf(), error))?;
        verify(&record, &self.config.policy)?;
        self.reporter.unit_verified(&record);
        Ok(())
    }
}
