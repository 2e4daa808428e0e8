//! Resolved, immutable configuration for a single orchestration run.
//!
//! [`OrchestrationConfig`] merges [`Settings`] with a [`DeploymentManifest`]
//! so the orchestrator receives every timeout, path and operation as one
//! value at construction time.

use std::fs;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};

use crate::Settings;
use crate::manifest::{
    ConfigOperation, DeploymentManifest, DeploymentUnit, ManifestError, ReadinessCheck,
};

const JAR_EXTENSION: &str = "jar";

/// Accepted state tokens used when verifying installed units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    active: String,
    created: String,
}

impl VerificationPolicy {
    #[must_use]
    pub fn new(active: impl Into<String>, created: impl Into<String>) -> Self {
        Self {
            active: active.into(),
            created: created.into(),
        }
    }

    /// Core state a unit must report.
    #[must_use]
    pub fn active(&self) -> &str {
        &self.active
    }

    /// State every applicable sub-framework must report.
    #[must_use]
    pub fn created(&self) -> &str {
        &self.created
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::new(
            crate::defaults::DEFAULT_ACTIVE_STATE,
            crate::defaults::DEFAULT_CREATED_STATE,
        )
    }
}

/// Location and credentials of the container's HTTP management bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub user: String,
    pub password: String,
    /// Container instance name used in management bean names.
    pub instance: String,
}

impl ManagementEndpoint {
    /// Base URL of the management bridge, e.g. `http://localhost:8181/jolokia`.
    #[must_use]
    pub fn url(&self) -> String {
        let path = self.path.trim_start_matches('/');
        format!("http://{}:{}/{path}", self.host, self.port)
    }
}

/// Container scripts resolved against the container home.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommands {
    pub start: Utf8PathBuf,
    pub status: Utf8PathBuf,
    pub stop: Utf8PathBuf,
}

impl ProcessCommands {
    /// Resolves the configured scripts against the container home. Needs no
    /// manifest, so `stop` can run when the manifest is unreadable.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let home = &settings.home;
        Self {
            start: home.join(&settings.start_command),
            status: home.join(&settings.status_command),
            stop: home.join(&settings.stop_command),
        }
    }
}

/// Merged configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationConfig {
    pub home: Utf8PathBuf,
    pub commands: ProcessCommands,
    pub management: ManagementEndpoint,
    pub running_marker: String,
    pub start_timeout: Duration,
    pub management_timeout: Duration,
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub enable_admin_user: bool,
    pub policy: VerificationPolicy,
    pub units: Vec<DeploymentUnit>,
    pub configuration: Vec<ConfigOperation>,
    pub features: Vec<String>,
    pub readiness_checks: Vec<ReadinessCheck>,
}

impl OrchestrationConfig {
    /// Builds the run configuration, expanding dependency directories into
    /// units placed ahead of the manifest's own units.
    pub fn from_parts(
        settings: &Settings,
        manifest: DeploymentManifest,
    ) -> Result<Self, ManifestError> {
        let DeploymentManifest {
            units,
            dependency_directories,
            configuration,
            features,
            readiness_checks,
        } = manifest;

        let mut resolved = Vec::new();
        for directory in &dependency_directories {
            resolved.extend(scan_dependency_directory(directory)?);
        }
        resolved.extend(units);

        let home = settings.home.clone();
        Ok(Self {
            commands: ProcessCommands::from_settings(settings),
            management: ManagementEndpoint {
                host: settings.management_host.clone(),
                port: settings.management_port,
                path: settings.management_path.clone(),
                user: settings.management_user.clone(),
                password: settings.management_password.clone(),
                instance: settings.instance_name.clone(),
            },
            running_marker: settings.running_marker.clone(),
            start_timeout: Duration::from_millis(settings.start_timeout_ms),
            management_timeout: Duration::from_millis(settings.management_timeout_ms),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            shutdown_timeout: Duration::from_millis(settings.shutdown_timeout_ms),
            enable_admin_user: !settings.skip_admin_user,
            policy: VerificationPolicy::new(&settings.active_state, &settings.created_state),
            home,
            units: resolved,
            configuration,
            features,
            readiness_checks,
        })
    }
}

/// Lists the `*.jar` files of a directory, sorted by file name.
fn scan_dependency_directory(directory: &Utf8Path) -> Result<Vec<DeploymentUnit>, ManifestError> {
    let scan_error = |source| ManifestError::ScanDependencies {
        path: directory.to_path_buf(),
        source,
    };
    let mut jars = Vec::new();
    for entry in fs::read_dir(directory).map_err(scan_error)? {
        let entry = entry.map_err(scan_error)?;
        if !entry.file_type().map_err(scan_error)?.is_file() {
            continue;
        }
        let path = Utf8PathBuf::from_path_buf(entry.path()).map_err(|_| {
            ManifestError::NonUtf8Dependency {
                path: directory.to_path_buf(),
            }
        })?;
        let is_jar = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case(JAR_EXTENSION));
        if is_jar {
            jars.push(path);
        }
    }
    jars.sort();
    Ok(jars.into_iter().map(DeploymentUnit::verified).collect())
}
