//! Test doubles shared by the orchestrator suites.

use std::collections::{HashMap, VecDeque};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use fuse_harness_config::{DeploymentManifest, OrchestrationConfig, Settings};

use crate::management::{
    BridgeError, ManagementClient, ManagementError, UnitId, UnitStatusRecord,
};
use crate::orchestrator::{LifecycleState, OrchestrationError, ReadinessTarget};
use crate::process::{ProcessController, ProcessError, ProcessHandle};
use crate::reporter::LifecycleReporter;

use fuse_harness_config::DeploymentUnit;

/// Builds a run configuration pointing the management probe at `port`.
///
/// Timeouts are short and the admin account step is disabled so no container
/// home is needed unless a test adds configuration operations.
pub fn config_for(port: u16) -> OrchestrationConfig {
    let settings = Settings {
        home: Utf8PathBuf::from("/nonexistent/container"),
        management_host: String::from("127.0.0.1"),
        management_port: port,
        start_timeout_ms: 500,
        management_timeout_ms: 500,
        poll_interval_ms: 10,
        skip_admin_user: true,
        ..Settings::default()
    };
    OrchestrationConfig::from_parts(&settings, DeploymentManifest::default())
        .expect("test configuration")
}

/// Listener standing in for the container's management port.
pub struct ManagementPort {
    listener: TcpListener,
}

impl ManagementPort {
    pub fn open() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind management port");
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().expect("local addr").port()
    }
}

/// Returns a port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    listener.local_addr().expect("local addr").port()
}

pub fn unavailable() -> ManagementError {
    ManagementError::Unavailable {
        url: String::from("http://127.0.0.1/jolokia"),
        source: BridgeError::HttpStatus(503),
    }
}

#[derive(Debug, Default)]
struct ProcessLog {
    statuses: VecDeque<String>,
    fail_launch: bool,
    starts: usize,
    status_calls: usize,
    shutdowns: usize,
}

/// Process controller replaying scripted status output.
///
/// The last status line repeats once the script is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProcess {
    log: Arc<Mutex<ProcessLog>>,
}

impl ScriptedProcess {
    pub fn reporting(statuses: &[&str]) -> Self {
        let process = Self::default();
        process.lock().statuses = statuses.iter().map(|line| (*line).to_owned()).collect();
        process
    }

    pub fn failing_launch() -> Self {
        let process = Self::default();
        process.lock().fail_launch = true;
        process
    }

    pub fn starts(&self) -> usize {
        self.lock().starts
    }

    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    pub fn shutdowns(&self) -> usize {
        self.lock().shutdowns
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProcessLog> {
        self.log.lock().expect("process log poisoned")
    }
}

impl ProcessController for ScriptedProcess {
    fn start(&mut self) -> Result<ProcessHandle, ProcessError> {
        let mut log = self.lock();
        log.starts += 1;
        if log.fail_launch {
            return Err(ProcessError::Launch {
                command: Utf8PathBuf::from("bin/start"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(ProcessHandle { pid: 4242 })
    }

    fn status(&mut self) -> Result<String, ProcessError> {
        let mut log = self.lock();
        log.status_calls += 1;
        let line = if log.statuses.len() > 1 {
            log.statuses.pop_front().unwrap_or_default()
        } else {
            log.statuses.front().cloned().unwrap_or_default()
        };
        Ok(line)
    }

    fn shutdown(&mut self) {
        self.lock().shutdowns += 1;
    }
}

/// Management call observed by [`ScriptedManagement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagementCall {
    Connect,
    Install(Utf8PathBuf),
    Status(UnitId),
    Operation(String, Vec<String>),
}

#[derive(Debug, Default)]
struct ManagementLog {
    installs: HashMap<Utf8PathBuf, UnitId>,
    records: HashMap<UnitId, UnitStatusRecord>,
    failing_features: Vec<String>,
    calls: Vec<ManagementCall>,
}

/// Management client answering from registered units.
#[derive(Debug, Clone, Default)]
pub struct ScriptedManagement {
    log: Arc<Mutex<ManagementLog>>,
}

impl ScriptedManagement {
    /// Registers a unit installed from `path` with the given status.
    pub fn with_unit(&self, path: &str, record: UnitStatusRecord) {
        let mut log = self.lock();
        log.installs.insert(Utf8PathBuf::from(path), record.id);
        log.records.insert(record.id, record);
    }

    pub fn fail_feature(&self, feature: &str) {
        self.lock().failing_features.push(feature.to_owned());
    }

    pub fn calls(&self) -> Vec<ManagementCall> {
        self.lock().calls.clone()
    }

    /// Paths passed to `install`, in call order.
    pub fn installed(&self) -> Vec<Utf8PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ManagementCall::Install(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagementLog> {
        self.log.lock().expect("management log poisoned")
    }
}

impl ManagementClient for ScriptedManagement {
    fn connect(&self, _timeout: Duration) -> Result<(), ManagementError> {
        self.lock().calls.push(ManagementCall::Connect);
        Ok(())
    }

    fn install(&self, artifact: &Utf8Path) -> Result<UnitId, ManagementError> {
        let mut log = self.lock();
        log.calls.push(ManagementCall::Install(artifact.to_path_buf()));
        log.installs
            .get(artifact)
            .copied()
            .ok_or_else(|| ManagementError::Install {
                artifact: artifact.to_path_buf(),
                source: BridgeError::Malformed(String::from("unknown artifact")),
            })
    }

    fn status(&self, unit: UnitId) -> Result<UnitStatusRecord, ManagementError> {
        let mut log = self.lock();
        log.calls.push(ManagementCall::Status(unit));
        log.records
            .get(&unit)
            .cloned()
            .ok_or(ManagementError::UnitNotFound { id: unit })
    }

    fn invoke_named_operation(&self, name: &str, args: &[String]) -> Result<(), ManagementError> {
        let mut log = self.lock();
        log.calls
            .push(ManagementCall::Operation(name.to_owned(), args.to_vec()));
        let failing = args
            .iter()
            .any(|arg| log.failing_features.contains(arg));
        if failing {
            return Err(ManagementError::Operation {
                operation: format!("{name}(java.lang.String)"),
                source: BridgeError::HttpStatus(500),
            });
        }
        Ok(())
    }
}

/// Lifecycle events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    StateChanged(LifecycleState),
    ProcessStarted(u32),
    ReadinessReached(ReadinessTarget),
    FeatureInstalled(String),
    UnitInstalled(UnitId),
    UnitVerified(UnitId),
    RunFailed(String),
    RunCompleted(usize),
}

/// Reporter that captures lifecycle events.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingReporter {
    fn state_changed(&self, _from: LifecycleState, to: LifecycleState) {
        self.record(LifecycleEvent::StateChanged(to));
    }

    fn process_started(&self, handle: ProcessHandle) {
        self.record(LifecycleEvent::ProcessStarted(handle.pid));
    }

    fn readiness_reached(&self, target: &ReadinessTarget, _attempts: u32, _elapsed: Duration) {
        self.record(LifecycleEvent::ReadinessReached(target.clone()));
    }

    fn feature_installed(&self, feature: &str) {
        self.record(LifecycleEvent::FeatureInstalled(feature.to_owned()));
    }

    fn unit_installed(&self, _unit: &DeploymentUnit, id: UnitId) {
        self.record(LifecycleEvent::UnitInstalled(id));
    }

    fn unit_verified(&self, record: &UnitStatusRecord) {
        self.record(LifecycleEvent::UnitVerified(record.id));
    }

    fn run_failed(&self, error: &OrchestrationError) {
        self.record(LifecycleEvent::RunFailed(error.to_string()));
    }

    fn run_completed(&self, units: usize) {
        self.record(LifecycleEvent::RunCompleted(units));
    }
}
