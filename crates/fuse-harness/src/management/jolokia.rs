//! [`ManagementClient`] over the Jolokia HTTP/JSON bridge.
//!
//! Each operation is a single `POST` of a Jolokia request to the bridge URL
//! with HTTP basic authentication. A fresh HTTP client is built per call and
//! dropped when the call returns, so no connection outlives an operation.

use std::time::Duration;

use camino::Utf8Path;
use fuse_harness_config::ManagementEndpoint;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use super::{BridgeError, ManagementClient, ManagementError, Subsystem, UnitId, UnitStatusRecord};

const MANAGEMENT_TARGET: &str = "fuse_harness::management";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const INSTALL_OPERATION: &str = "install(java.lang.String,boolean)";
const LIST_OPERATION: &str = "list()";
const STRING_SIGNATURE: &str = "java.lang.String";

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JolokiaRequest {
    Version,
    Exec {
        mbean: String,
        operation: String,
        arguments: Vec<Value>,
    },
}

#[derive(Debug, Deserialize)]
struct JolokiaResponse {
    status: u16,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Production management client for Karaf-based containers.
#[derive(Debug, Clone)]
pub struct JolokiaClient {
    endpoint: ManagementEndpoint,
    request_timeout: Duration,
}

impl JolokiaClient {
    #[must_use]
    pub fn new(endpoint: ManagementEndpoint) -> Self {
        Self {
            endpoint,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Overrides the per-request timeout used by operations other than
    /// [`ManagementClient::connect`], which takes its own.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn bundle_mbean(&self) -> String {
        format!("org.apache.karaf:type=bundle,name={}", self.endpoint.instance)
    }

    fn feature_mbean(&self) -> String {
        format!("org.apache.karaf:type=feature,name={}", self.endpoint.instance)
    }

    fn execute(&self, request: &JolokiaRequest, timeout: Duration) -> Result<Value, BridgeError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(0)
            .build()?;
        let response = client
            .post(self.endpoint.url())
            .basic_auth(&self.endpoint.user, Some(&self.endpoint.password))
            .json(request)
            .send()?;
        let http_status = response.status();
        if !http_status.is_success() {
            return Err(BridgeError::HttpStatus(http_status.as_u16()));
        }
        let body: JolokiaResponse = response.json()?;
        if body.status != 200 {
            return Err(BridgeError::Remote {
                status: body.status,
                error_type: body.error_type.unwrap_or_default(),
                message: body.error.unwrap_or_default(),
            });
        }
        Ok(body.value)
    }

    fn exec(
        &self,
        mbean: String,
        operation: String,
        arguments: Vec<Value>,
    ) -> Result<Value, BridgeError> {
        let request = JolokiaRequest::Exec {
            mbean,
            operation,
            arguments,
        };
        self.execute(&request, self.request_timeout)
    }

    fn install_unit(&self, artifact: &Utf8Path) -> Result<UnitId, BridgeError> {
        let url = file_url(artifact)?;
        let value = self.exec(
            self.bundle_mbean(),
            INSTALL_OPERATION.to_owned(),
            vec![Value::String(url.into()), Value::Bool(true)],
        )?;
        cell_u64(&value)
            .map(UnitId)
            .ok_or_else(|| BridgeError::Malformed(format!("install returned {value}")))
    }
}

impl ManagementClient for JolokiaClient {
    fn connect(&self, timeout: Duration) -> Result<(), ManagementError> {
        let value = self
            .execute(&JolokiaRequest::Version, timeout)
            .map_err(|source| ManagementError::Unavailable {
                url: self.endpoint.url(),
                source,
            })?;
        let agent = value.get("agent").and_then(Value::as_str).unwrap_or("unknown");
        debug!(
            target: MANAGEMENT_TARGET,
            agent,
            "management bridge answered handshake"
        );
        Ok(())
    }

    fn install(&self, artifact: &Utf8Path) -> Result<UnitId, ManagementError> {
        let id = self
            .install_unit(artifact)
            .map_err(|source| ManagementError::Install {
                artifact: artifact.to_path_buf(),
                source,
            })?;
        debug!(target: MANAGEMENT_TARGET, artifact = %artifact, id = id.0, "unit installed");
        Ok(id)
    }

    fn status(&self, unit: UnitId) -> Result<UnitStatusRecord, ManagementError> {
        let value = self
            .exec(self.bundle_mbean(), LIST_OPERATION.to_owned(), Vec::new())
            .map_err(|source| ManagementError::Status { id: unit, source })?;
        find_unit(&value, unit)
            .map_err(|source| ManagementError::Status { id: unit, source })?
            .ok_or(ManagementError::UnitNotFound { id: unit })
    }

    fn invoke_named_operation(&self, name: &str, args: &[String]) -> Result<(), ManagementError> {
        let signature = vec![STRING_SIGNATURE; args.len()].join(",");
        let operation = format!("{name}({signature})");
        let arguments = args.iter().cloned().map(Value::String).collect();
        self.exec(self.feature_mbean(), operation.clone(), arguments)
            .map(drop)
            .map_err(|source| ManagementError::Operation { operation, source })
    }
}

fn file_url(artifact: &Utf8Path) -> Result<Url, BridgeError> {
    let unresolvable = || BridgeError::ArtifactUrl(artifact.to_path_buf());
    let absolute = std::path::absolute(artifact.as_std_path()).map_err(|_| unresolvable())?;
    Url::from_file_path(absolute).map_err(|()| unresolvable())
}

/// Selects the listing row describing `unit`.
///
/// Rows are keyed by identifier; the row's own `ID` cell is preferred when
/// present.
fn find_unit(listing: &Value, unit: UnitId) -> Result<Option<UnitStatusRecord>, BridgeError> {
    let rows = listing
        .as_object()
        .ok_or_else(|| BridgeError::Malformed(format!("unit listing is not an object: {listing}")))?;
    for (key, row) in rows {
        let Some(row) = row.as_object() else {
            continue;
        };
        let id = row
            .get("ID")
            .and_then(cell_u64)
            .or_else(|| key.parse().ok());
        if id == Some(unit.0) {
            return Ok(Some(record_from_row(unit, row)));
        }
    }
    Ok(None)
}

fn record_from_row(id: UnitId, row: &Map<String, Value>) -> UnitStatusRecord {
    let text = |column: &str| row.get(column).and_then(cell_text);
    let mut record = UnitStatusRecord::new(
        id,
        text("Name").unwrap_or_default(),
        text("Version").unwrap_or_default(),
    );
    record.core_state = text("State");
    for subsystem in Subsystem::ALL {
        if row.contains_key(subsystem.column()) {
            record
                .subsystems
                .insert(subsystem, text(subsystem.column()).unwrap_or_default());
        }
    }
    record
}

fn cell_text(cell: &Value) -> Option<String> {
    match cell {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn cell_u64(cell: &Value) -> Option<u64> {
    match cell {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
