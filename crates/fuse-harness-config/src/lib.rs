//! Shared configuration for the `fuse-harness` container orchestrator.
//!
//! [`Settings`] is layered by `ortho_config`: built-in defaults, then a
//! configuration file, then `FUSE_HARNESS_*` environment variables, then
//! command-line flags. The deployment manifest ([`DeploymentManifest`]) lists
//! what a run installs, and [`OrchestrationConfig`] merges both into the value
//! the orchestrator consumes.

mod defaults;
mod logging;
mod manifest;
mod orchestration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ACTIVE_STATE, DEFAULT_CREATED_STATE, DEFAULT_LOG_FILTER, DEFAULT_MANAGEMENT_PORT,
    DEFAULT_RUNNING_MARKER, default_log_filter, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use manifest::{
    ConfigOperation, DeploymentManifest, DeploymentUnit, ManifestError, Property, ReadinessCheck,
};
pub use orchestration::{
    ManagementEndpoint, OrchestrationConfig, ProcessCommands, VerificationPolicy,
};

/// Settings controlling a harness run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "FUSE_HARNESS")]
pub struct Settings {
    /// Container installation directory.
    #[serde(default = "defaults::default_home")]
    #[ortho_config(default = defaults::default_home())]
    pub home: Utf8PathBuf,
    /// Start script, relative to the container home.
    #[serde(default = "defaults::default_start_command")]
    #[ortho_config(default = defaults::default_start_command())]
    pub start_command: String,
    /// Status script, relative to the container home.
    #[serde(default = "defaults::default_status_command")]
    #[ortho_config(default = defaults::default_status_command())]
    pub status_command: String,
    /// Stop script, relative to the container home.
    #[serde(default = "defaults::default_stop_command")]
    #[ortho_config(default = defaults::default_stop_command())]
    pub stop_command: String,
    /// Line prefix printed by the status script once the container runs.
    #[serde(default = "defaults::default_running_marker")]
    #[ortho_config(default = defaults::default_running_marker())]
    pub running_marker: String,
    #[serde(default = "defaults::default_start_timeout_ms")]
    #[ortho_config(default = defaults::default_start_timeout_ms())]
    pub start_timeout_ms: u64,
    #[serde(default = "defaults::default_management_timeout_ms")]
    #[ortho_config(default = defaults::default_management_timeout_ms())]
    pub management_timeout_ms: u64,
    #[serde(default = "defaults::default_poll_interval_ms")]
    #[ortho_config(default = defaults::default_poll_interval_ms())]
    pub poll_interval_ms: u64,
    #[serde(default = "defaults::default_shutdown_timeout_ms")]
    #[ortho_config(default = defaults::default_shutdown_timeout_ms())]
    pub shutdown_timeout_ms: u64,
    #[serde(default = "defaults::default_management_host")]
    #[ortho_config(default = defaults::default_management_host())]
    pub management_host: String,
    #[serde(default = "defaults::default_management_port")]
    #[ortho_config(default = defaults::default_management_port())]
    pub management_port: u16,
    /// Path of the HTTP management bridge below the host root.
    #[serde(default = "defaults::default_management_path")]
    #[ortho_config(default = defaults::default_management_path())]
    pub management_path: String,
    #[serde(default = "defaults::default_management_user")]
    #[ortho_config(default = defaults::default_management_user())]
    pub management_user: String,
    #[serde(default = "defaults::default_management_password")]
    #[ortho_config(default = defaults::default_management_password())]
    pub management_password: String,
    /// Container instance name used in management bean names.
    #[serde(default = "defaults::default_instance_name")]
    #[ortho_config(default = defaults::default_instance_name())]
    pub instance_name: String,
    /// Leaves the default admin account commented out. The account is
    /// enabled before every start unless this is set.
    #[serde(default)]
    #[ortho_config(default = false)]
    pub skip_admin_user: bool,
    #[serde(default = "defaults::default_active_state")]
    #[ortho_config(default = defaults::default_active_state())]
    pub active_state: String,
    #[serde(default = "defaults::default_created_state")]
    #[ortho_config(default = defaults::default_created_state())]
    pub created_state: String,
    /// JSON deployment manifest; an empty manifest is used when unset.
    #[serde(default)]
    pub manifest: Option<Utf8PathBuf>,
    #[serde(default = "defaults::default_log_filter_string")]
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    #[serde(default = "defaults::default_log_format")]
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: defaults::default_home(),
            start_command: defaults::default_start_command(),
            status_command: defaults::default_status_command(),
            stop_command: defaults::default_stop_command(),
            running_marker: defaults::default_running_marker(),
            start_timeout_ms: defaults::default_start_timeout_ms(),
            management_timeout_ms: defaults::default_management_timeout_ms(),
            poll_interval_ms: defaults::default_poll_interval_ms(),
            shutdown_timeout_ms: defaults::default_shutdown_timeout_ms(),
            management_host: defaults::default_management_host(),
            management_port: defaults::default_management_port(),
            management_path: defaults::default_management_path(),
            management_user: defaults::default_management_user(),
            management_password: defaults::default_management_password(),
            instance_name: defaults::default_instance_name(),
            skip_admin_user: false,
            active_state: defaults::default_active_state(),
            created_state: defaults::default_created_state(),
            manifest: None,
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
        }
    }
}

impl Settings {
    /// Log filter expression handed to the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Loads the manifest named by the settings, or an empty one.
    pub fn load_manifest(&self) -> Result<DeploymentManifest, ManifestError> {
        match &self.manifest {
            Some(path) => DeploymentManifest::load(path),
            None => Ok(DeploymentManifest::default()),
        }
    }

    /// Resolves the settings and manifest into a run configuration.
    pub fn orchestration(&self) -> Result<OrchestrationConfig, ManifestError> {
        let manifest = self.load_manifest()?;
        OrchestrationConfig::from_parts(self, manifest)
    }
}
