//! Deployment manifest describing what a harness run installs and configures.
//!
//! The manifest is a JSON document kept next to the build that drives the
//! harness. It lists the artifacts to deploy, directories of dependency
//! bundles, file-configuration operations, named features and any extra
//! endpoints that must accept connections before the container is considered
//! ready.

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One artifact to install into the container.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeploymentUnit {
    path: Utf8PathBuf,
    #[serde(default = "require_verification_default")]
    require_verification: bool,
}

fn require_verification_default() -> bool {
    true
}

impl DeploymentUnit {
    /// Builds a unit whose runtime state is verified after installation.
    #[must_use]
    pub fn verified(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            require_verification: true,
        }
    }

    /// Builds a unit that is installed without state verification.
    #[must_use]
    pub fn unverified(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            require_verification: false,
        }
    }

    /// Location of the artifact on disk.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.path.as_path()
    }

    /// Whether the unit's status must be verified after installation.
    #[must_use]
    pub fn require_verification(&self) -> bool {
        self.require_verification
    }
}

/// Key/value pair appended to a properties file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub value: String,
}

impl Property {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// File-configuration operation applied inside the container home.
///
/// Destinations are relative to the container home directory.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ConfigOperation {
    /// Copies `source` into the `destination` directory.
    Copy {
        source: Utf8PathBuf,
        destination: Utf8PathBuf,
    },
    /// Appends `key = value` lines to the `destination` file.
    Append {
        destination: Utf8PathBuf,
        properties: Vec<Property>,
    },
    /// Replaces every occurrence of `target` in the `destination` file.
    Replace {
        destination: Utf8PathBuf,
        target: String,
        replacement: String,
    },
}

impl ConfigOperation {
    /// Short name used in logs and error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Copy { .. } => "copy",
            Self::Append { .. } => "append",
            Self::Replace { .. } => "replace",
        }
    }

    /// Destination of the operation relative to the container home.
    #[must_use]
    pub fn destination(&self) -> &Utf8Path {
        match self {
            Self::Copy { destination, .. }
            | Self::Append { destination, .. }
            | Self::Replace { destination, .. } => destination.as_path(),
        }
    }
}

/// Additional TCP endpoint that must accept connections before deployment.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReadinessCheck {
    pub name: String,
    pub port: u16,
}

/// Declarative description of a harness run.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DeploymentManifest {
    pub units: Vec<DeploymentUnit>,
    pub dependency_directories: Vec<Utf8PathBuf>,
    pub configuration: Vec<ConfigOperation>,
    pub features: Vec<String>,
    pub readiness_checks: Vec<ReadinessCheck>,
}

impl DeploymentManifest {
    /// Reads and parses a manifest from disk.
    pub fn load(path: &Utf8Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    fn parse(path: &Utf8Path, content: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Errors raised while loading the manifest or expanding its sources.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read deployment manifest '{path}': {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse deployment manifest '{path}': {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to scan dependency directory '{path}': {source}")]
    ScanDependencies {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("dependency directory '{path}' contains a non UTF-8 file name")]
    NonUtf8Dependency { path: Utf8PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "units": [
            { "path": "target/app.jar" },
            { "path": "target/fragment.jar", "require_verification": false }
        ],
        "dependency_directories": ["repo/org/example/dep/1.0"],
        "configuration": [
            { "operation": "copy", "source": "src/test/app.cfg", "destination": "etc" },
            {
                "operation": "append",
                "destination": "etc/system.properties",
                "properties": [{ "key": "bar", "value": "2" }, { "key": "alpha", "value": "1" }]
            },
            {
                "operation": "replace",
                "destination": "etc/org.ops4j.pax.logging.cfg",
                "target": "INFO",
                "replacement": "DEBUG"
            }
        ],
        "features": ["camel-jackson"],
        "readiness_checks": [{ "name": "ssh", "port": 8101 }]
    }"#;

    #[test]
    fn parses_full_manifest() {
        let manifest =
            DeploymentManifest::parse(Utf8Path::new("harness.json"), MANIFEST).expect("parse");
        assert_eq!(
            manifest.units,
            vec![
                DeploymentUnit::verified("target/app.jar"),
                DeploymentUnit::unverified("target/fragment.jar"),
            ]
        );
        assert_eq!(manifest.features, vec![String::from("camel-jackson")]);
        assert_eq!(manifest.readiness_checks.len(), 1);
        let kinds: Vec<_> = manifest.configuration.iter().map(ConfigOperation::kind).collect();
        assert_eq!(kinds, vec!["copy", "append", "replace"]);
    }

    #[test]
    fn append_properties_keep_declared_order() {
        let manifest =
            DeploymentManifest::parse(Utf8Path::new("harness.json"), MANIFEST).expect("parse");
        let Some(ConfigOperation::Append { properties, .. }) = manifest.configuration.get(1) else {
            panic!("expected append operation");
        };
        let keys: Vec<_> = properties.iter().map(|property| property.key.as_str()).collect();
        assert_eq!(keys, vec!["bar", "alpha"]);
    }

    #[test]
    fn empty_document_yields_empty_manifest() {
        let manifest = DeploymentManifest::parse(Utf8Path::new("harness.json"), "{}").expect("parse");
        assert_eq!(manifest, DeploymentManifest::default());
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let error = DeploymentManifest::parse(
            Utf8Path::new("harness.json"),
            r#"{ "configuration": [{ "operation": "delete", "destination": "etc" }] }"#,
        )
        .expect_err("unknown operation should fail");
        assert!(matches!(error, ManifestError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_read_error() {
        let error = DeploymentManifest::load(Utf8Path::new("/nonexistent/harness.json"))
            .expect_err("missing manifest should fail");
        assert!(matches!(error, ManifestError::Read { .. }));
    }
}
