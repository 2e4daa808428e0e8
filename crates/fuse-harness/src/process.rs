//! Container process control.
//!
//! [`SystemProcessController`] launches the container's start script, runs the
//! status script to observe readiness, and runs the stop script when the run
//! ends or fails. It never retries; readiness polling lives in
//! [`crate::poller`].

use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use fuse_harness_config::{OrchestrationConfig, ProcessCommands, Settings};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::poller::{PollOutcome, poll_until};

const PROCESS_TARGET: &str = "fuse_harness::process";
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifies the launched container process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    pub pid: u32,
}

/// Errors raised while launching container scripts.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("the container process was already started (pid {pid})")]
    AlreadyStarted { pid: u32 },
    #[error("'{command}' did not finish within {} ms", .timeout.as_millis())]
    StopTimedOut {
        command: Utf8PathBuf,
        timeout: Duration,
    },
    #[error("status command '{command}' gave no answer within {} ms", .timeout.as_millis())]
    StatusTimedOut {
        command: Utf8PathBuf,
        timeout: Duration,
    },
}

/// Controls the container's OS process.
pub trait ProcessController {
    /// Launches the container detached from the harness's standard streams.
    fn start(&mut self) -> Result<ProcessHandle, ProcessError>;

    /// Runs the status command and returns its standard output.
    ///
    /// A container that is not up yet is not an error; the output simply
    /// lacks the running marker.
    fn status(&mut self) -> Result<String, ProcessError>;

    /// Stops the container on a best-effort basis.
    ///
    /// Never fails: problems are logged. Calling it when nothing was started,
    /// or more than once, does nothing.
    fn shutdown(&mut self);
}

/// Returns `true` when any line of `output` starts with `marker`.
///
/// Matching on line starts keeps `Not Running ...` from counting as running.
#[must_use]
pub fn reports_running(output: &str, marker: &str) -> bool {
    output
        .lines()
        .any(|line| line.trim_start().starts_with(marker))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerState {
    Idle,
    Running,
    Stopped,
}

/// Production controller driving the container's scripts.
#[derive(Debug)]
pub struct SystemProcessController {
    home: Utf8PathBuf,
    commands: ProcessCommands,
    shutdown_timeout: Duration,
    status_timeout: Duration,
    child: Option<Child>,
    state: ControllerState,
}

impl SystemProcessController {
    #[must_use]
    pub fn new(
        home: impl Into<Utf8PathBuf>,
        commands: ProcessCommands,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            home: home.into(),
            commands,
            shutdown_timeout,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
            child: None,
            state: ControllerState::Idle,
        }
    }

    /// Builds a controller from a run configuration. A single status call
    /// may take at most the start timeout.
    #[must_use]
    pub fn from_config(config: &OrchestrationConfig) -> Self {
        Self::new(
            config.home.clone(),
            config.commands.clone(),
            config.shutdown_timeout,
        )
        .with_status_timeout(config.start_timeout)
    }

    /// Builds a controller for stopping a container straight from settings,
    /// without reading the deployment manifest.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.home.clone(),
            ProcessCommands::from_settings(settings),
            Duration::from_millis(settings.shutdown_timeout_ms),
        )
        .with_status_timeout(Duration::from_millis(settings.start_timeout_ms))
    }

    /// Bounds how long one status command may run before it is killed.
    #[must_use]
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    fn command(&self, program: &Utf8Path) -> Command {
        // Relative scripts would otherwise resolve against the new working
        // directory.
        let program = std::path::absolute(program)
            .unwrap_or_else(|_| program.as_std_path().to_path_buf());
        let mut command = Command::new(program);
        command.current_dir(self.home.as_std_path()).stdin(Stdio::null());
        command
    }

    /// Runs the stop command and waits up to the shutdown timeout for it.
    ///
    /// Unlike [`ProcessController::shutdown`] this works on a container this
    /// controller did not start, and reports failures to the caller.
    pub fn stop(&self) -> Result<(), ProcessError> {
        let stop = &self.commands.stop;
        let mut child = self
            .command(stop)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProcessError::Launch {
                command: stop.clone(),
                source,
            })?;
        if wait_for_exit(&mut child, self.shutdown_timeout) {
            return Ok(());
        }
        kill_and_reap(&mut child);
        Err(ProcessError::StopTimedOut {
            command: stop.clone(),
            timeout: self.shutdown_timeout,
        })
    }

    fn reap_start_child(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if wait_for_exit(&mut child, self.shutdown_timeout) {
            return;
        }
        warn!(
            target: PROCESS_TARGET,
            pid = child.id(),
            "container process still running after stop; killing it"
        );
        kill_and_reap(&mut child);
    }
}

impl ProcessController for SystemProcessController {
    fn start(&mut self) -> Result<ProcessHandle, ProcessError> {
        if let Some(child) = &self.child {
            return Err(ProcessError::AlreadyStarted { pid: child.id() });
        }
        let start = &self.commands.start;
        let child = self
            .command(start)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProcessError::Launch {
                command: start.clone(),
                source,
            })?;
        let handle = ProcessHandle { pid: child.id() };
        info!(
            target: PROCESS_TARGET,
            pid = handle.pid,
            command = %start,
            home = %self.home,
            "container start command launched"
        );
        self.child = Some(child);
        self.state = ControllerState::Running;
        Ok(handle)
    }

    fn status(&mut self) -> Result<String, ProcessError> {
        let status = &self.commands.status;
        let deadline = Instant::now() + self.status_timeout;
        let timed_out = || ProcessError::StatusTimedOut {
            command: status.clone(),
            timeout: self.status_timeout,
        };
        let mut child = self
            .command(status)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ProcessError::Launch {
                command: status.clone(),
                source,
            })?;
        let output = child.stdout.take().map(read_in_background);

        if !wait_for_exit(&mut child, self.status_timeout) {
            warn!(target: PROCESS_TARGET, pid = child.id(), "status command hung; killing it");
            kill_and_reap(&mut child);
            return Err(timed_out());
        }
        // Descendants may still hold the pipe open after the script exits.
        let text = match output {
            Some(receiver) => receiver
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .map_err(|_| timed_out())?,
            None => String::new(),
        };
        debug!(
            target: PROCESS_TARGET,
            exit_code = child.try_wait().ok().flatten().and_then(|code| code.code()),
            output = %text.trim(),
            "status command finished"
        );
        Ok(text)
    }

    fn shutdown(&mut self) {
        if self.state != ControllerState::Running {
            debug!(
                target: PROCESS_TARGET,
                "shutdown requested with no running container; nothing to do"
            );
            return;
        }
        self.state = ControllerState::Stopped;
        info!(target: PROCESS_TARGET, command = %self.commands.stop, "stopping container");
        if let Err(error) = self.stop() {
            warn!(target: PROCESS_TARGET, error = %error, "stop command failed");
        }
        self.reap_start_child();
    }
}

/// Waits up to `timeout` for `child` to exit, returning whether it did.
fn wait_for_exit(child: &mut Child, timeout: Duration) -> bool {
    let outcome = poll_until(
        || child.try_wait().map(|status| status.is_some()),
        timeout,
        EXIT_POLL_INTERVAL,
    );
    if let PollOutcome::TimedOut {
        last_error: Some(error),
        ..
    } = &outcome
    {
        warn!(target: PROCESS_TARGET, error = %error, "failed to query child exit status");
    }
    outcome.is_success()
}

/// Drains `stdout` on its own thread so a chatty script cannot fill the pipe
/// and block before it exits.
fn read_in_background(mut stdout: ChildStdout) -> Receiver<String> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Err(error) = stdout.read_to_end(&mut bytes) {
            debug!(target: PROCESS_TARGET, error = %error, "status output truncated");
        }
        let _ = sender.send(String::from_utf8_lossy(&bytes).into_owned());
    });
    receiver
}

fn kill_and_reap(child: &mut Child) {
    if let Err(error) = child.kill() {
        warn!(target: PROCESS_TARGET, pid = child.id(), error = %error, "failed to kill child");
    }
    if let Err(error) = child.wait() {
        warn!(target: PROCESS_TARGET, pid = child.id(), error = %error, "failed to reap child");
    }
}
