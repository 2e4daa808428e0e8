//! Deployment verification harness for OSGi application containers.
//!
//! The harness starts a Karaf-style container, waits until the process and
//! its management bridge are ready, applies file configuration, installs
//! features and deployment units, and verifies that every unit reached its
//! expected runtime state. Any failure after the container was started shuts
//! it down once before the error is reported.
//!
//! [`orchestrator::LifecycleOrchestrator`] owns the state machine; the
//! collaborators it drives sit behind the [`process::ProcessController`] and
//! [`management::ManagementClient`] traits.

mod cli;
pub mod configure;
pub mod management;
pub mod orchestrator;
pub mod poller;
pub mod process;
pub mod reporter;
pub mod socket;
pub mod telemetry;
pub mod verifier;

#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use fuse_harness_config::{ManifestError, OrchestrationConfig, Settings};
use ortho_config::OrthoConfig;
use thiserror::Error;

use crate::cli::{Cli, CliCommand, split_arguments};
use crate::management::JolokiaClient;
use crate::orchestrator::{LifecycleOrchestrator, OrchestrationError};
use crate::process::{ProcessError, SystemProcessController};
use crate::reporter::StructuredLifecycleReporter;
use crate::telemetry::TelemetryError;

/// Errors surfaced by the binary entry point.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
    #[error("failed to stop the container: {0}")]
    Stop(#[source] ProcessError),
}

/// Starts the container and deploys `config` with the production
/// collaborators.
pub fn start(config: OrchestrationConfig) -> Result<(), OrchestrationError> {
    let process = SystemProcessController::from_config(&config);
    let management = JolokiaClient::new(config.management.clone());
    LifecycleOrchestrator::new(
        config,
        process,
        management,
        StructuredLifecycleReporter::new(),
    )
    .run()
}

/// Runs the binary with the given arguments, writing failures to `stderr`.
pub fn run<I, E>(args: I, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    E: Write,
{
    let args: Vec<OsString> = args.into_iter().collect();
    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error)) => {
            let _ = error.print();
            if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn execute(args: &[OsString]) -> Result<(), AppError> {
    let split = split_arguments(args);
    let cli = Cli::try_parse_from(&split.command_arguments).map_err(AppError::CliUsage)?;
    let settings =
        Settings::load_from_iter(split.config_arguments).map_err(AppError::LoadConfiguration)?;
    telemetry::initialise(&settings)?;
    match cli.command {
        CliCommand::Start => start(settings.orchestration()?).map_err(AppError::from),
        CliCommand::Stop => SystemProcessController::from_settings(&settings)
            .stop()
            .map_err(AppError::Stop),
    }
}
