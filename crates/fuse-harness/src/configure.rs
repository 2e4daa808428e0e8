//! File configuration applied inside the container home.
//!
//! All destinations are resolved through a capability handle on the container
//! home, so an operation can only touch files below it. Copy sources live in
//! the build that drives the harness and are read from the ambient filesystem.

use std::fs;
use std::io;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::fs::Dir;
use fuse_harness_config::{ConfigOperation, Property};
use thiserror::Error;
use tracing::info;

const CONFIGURE_TARGET: &str = "fuse_harness::configure";
const USERS_FILE: &str = "etc/users.properties";
const COMMENTED_ADMIN_ACCOUNT: &str = "#admin=admin,admin,manager,viewer,Monitor, Operator, Maintainer, Deployer, Auditor, Administrator, SuperUser";
const ADMIN_ACCOUNT: &str = "admin=admin,admin,manager,viewer,Monitor, Operator, Maintainer, Deployer, Auditor, Administrator, SuperUser";

/// Errors raised while configuring the container home.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("failed to open container home '{home}': {source}")]
    OpenHome {
        home: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{operation} destination '{path}' is outside the container home")]
    OutsideHome {
        operation: &'static str,
        path: Utf8PathBuf,
    },
    #[error("{operation} source '{path}' does not exist")]
    MissingSource {
        operation: &'static str,
        path: Utf8PathBuf,
    },
    #[error("{operation} source '{path}' has no file name")]
    UnnamedSource {
        operation: &'static str,
        path: Utf8PathBuf,
    },
    #[error("{operation} destination '{path}' does not exist")]
    MissingDestination {
        operation: &'static str,
        path: Utf8PathBuf,
    },
    #[error("{operation} destination '{path}' is not a directory")]
    NotADirectory {
        operation: &'static str,
        path: Utf8PathBuf,
    },
    #[error("{operation} destination '{path}' is a directory")]
    NotAFile {
        operation: &'static str,
        path: Utf8PathBuf,
    },
    #[error("{operation} failed on '{path}': {source}")]
    Io {
        operation: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Directory,
    File,
}

/// Capability handle on the container installation directory.
#[derive(Debug)]
pub struct ContainerHome {
    root: Utf8PathBuf,
    dir: Dir,
}

impl ContainerHome {
    /// Opens the container home for configuration.
    pub fn open(root: &Utf8Path) -> Result<Self, ConfigurationError> {
        let dir = Dir::open_ambient_dir(root, cap_std::ambient_authority()).map_err(|source| {
            ConfigurationError::OpenHome {
                home: root.to_path_buf(),
                source,
            }
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
        })
    }

    /// Applies one configuration operation.
    pub fn apply(&self, operation: &ConfigOperation) -> Result<(), ConfigurationError> {
        info!(
            target: CONFIGURE_TARGET,
            operation = operation.kind(),
            home = %self.root,
            destination = %operation.destination(),
            "applying configuration"
        );
        match operation {
            ConfigOperation::Copy {
                source,
                destination,
            } => self.copy(source, destination),
            ConfigOperation::Append {
                destination,
                properties,
            } => self.append(destination, properties),
            ConfigOperation::Replace {
                destination,
                target,
                replacement,
            } => self.replace("replace", destination, target, replacement),
        }
    }

    /// Activates the default administrator account in `etc/users.properties`.
    pub fn enable_admin_user(&self) -> Result<(), ConfigurationError> {
        info!(target: CONFIGURE_TARGET, file = USERS_FILE, "enabling admin account");
        self.replace(
            "enable admin",
            Utf8Path::new(USERS_FILE),
            COMMENTED_ADMIN_ACCOUNT,
            ADMIN_ACCOUNT,
        )
    }

    fn copy(&self, source: &Utf8Path, destination: &Utf8Path) -> Result<(), ConfigurationError> {
        const OPERATION: &str = "copy";
        self.check_destination(OPERATION, destination, Expect::Directory)?;
        if !source.is_file() {
            return Err(ConfigurationError::MissingSource {
                operation: OPERATION,
                path: source.to_path_buf(),
            });
        }
        let file_name = source
            .file_name()
            .ok_or_else(|| ConfigurationError::UnnamedSource {
                operation: OPERATION,
                path: source.to_path_buf(),
            })?;
        let contents = fs::read(source).map_err(|error| io_error(OPERATION, source, error))?;
        let target = destination.join(file_name);
        self.dir
            .write(&target, contents)
            .map_err(|error| io_error(OPERATION, &target, error))
    }

    fn append(
        &self,
        destination: &Utf8Path,
        properties: &[Property],
    ) -> Result<(), ConfigurationError> {
        const OPERATION: &str = "append";
        self.check_destination(OPERATION, destination, Expect::File)?;
        let mut contents = self.read(OPERATION, destination)?;
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        for Property { key, value } in properties {
            contents.push_str(&format!("{key} = {value}\n"));
        }
        self.write(OPERATION, destination, contents)
    }

    fn replace(
        &self,
        operation: &'static str,
        destination: &Utf8Path,
        target: &str,
        replacement: &str,
    ) -> Result<(), ConfigurationError> {
        self.check_destination(operation, destination, Expect::File)?;
        let contents = self.read(operation, destination)?;
        self.write(operation, destination, contents.replace(target, replacement))
    }

    fn check_destination(
        &self,
        operation: &'static str,
        destination: &Utf8Path,
        expect: Expect,
    ) -> Result<(), ConfigurationError> {
        let escapes = destination.components().any(|component| {
            matches!(
                component,
                Utf8Component::ParentDir | Utf8Component::RootDir | Utf8Component::Prefix(_)
            )
        });
        if escapes {
            return Err(ConfigurationError::OutsideHome {
                operation,
                path: destination.to_path_buf(),
            });
        }
        let metadata = match self.dir.metadata(destination) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigurationError::MissingDestination {
                    operation,
                    path: destination.to_path_buf(),
                });
            }
            Err(error) => return Err(io_error(operation, destination, error)),
        };
        let path = destination.to_path_buf();
        match expect {
            Expect::Directory if !metadata.is_dir() => {
                Err(ConfigurationError::NotADirectory { operation, path })
            }
            Expect::File if metadata.is_dir() => Err(ConfigurationError::NotAFile { operation, path }),
            _ => Ok(()),
        }
    }

    fn read(&self, operation: &'static str, path: &Utf8Path) -> Result<String, ConfigurationError> {
        self.dir
            .read_to_string(path)
            .map_err(|error| io_error(operation, path, error))
    }

    fn write(
        &self,
        operation: &'static str,
        path: &Utf8Path,
        contents: String,
    ) -> Result<(), ConfigurationError> {
        self.dir
            .write(path, contents)
            .map_err(|error| io_error(operation, path, error))
    }
}

fn io_error(operation: &'static str, path: &Utf8Path, source: io::Error) -> ConfigurationError {
    ConfigurationError::Io {
        operation,
        path: path.to_path_buf(),
        source,
    }
}
