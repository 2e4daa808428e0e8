use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default port of the container's HTTP management bridge.
pub const DEFAULT_MANAGEMENT_PORT: u16 = 8181;

/// Token reported by the status command once the container is up.
pub const DEFAULT_RUNNING_MARKER: &str = "Running";

/// Core state a unit must reach to count as deployed.
pub const DEFAULT_ACTIVE_STATE: &str = "ACTIVE";

/// Sub-framework state a unit must reach when it uses that sub-framework.
pub const DEFAULT_CREATED_STATE: &str = "CREATED";

pub const DEFAULT_START_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_MANAGEMENT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

/// Default log filter expression used by the binary.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binary.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Container installation directory used when none is configured.
pub fn default_home() -> Utf8PathBuf {
    Utf8PathBuf::from("target/container")
}

pub fn default_start_command() -> String {
    script("start")
}

pub fn default_status_command() -> String {
    script("status")
}

pub fn default_stop_command() -> String {
    script("stop")
}

#[cfg(windows)]
fn script(name: &str) -> String {
    format!("bin\\{name}.bat")
}

#[cfg(not(windows))]
fn script(name: &str) -> String {
    format!("bin/{name}")
}

pub fn default_running_marker() -> String {
    DEFAULT_RUNNING_MARKER.to_string()
}

pub fn default_management_host() -> String {
    String::from("localhost")
}

pub fn default_management_port() -> u16 {
    DEFAULT_MANAGEMENT_PORT
}

pub fn default_management_path() -> String {
    String::from("/jolokia")
}

pub fn default_management_user() -> String {
    String::from("admin")
}

pub fn default_management_password() -> String {
    String::from("admin")
}

pub fn default_instance_name() -> String {
    String::from("root")
}

pub fn default_active_state() -> String {
    DEFAULT_ACTIVE_STATE.to_string()
}

pub fn default_created_state() -> String {
    DEFAULT_CREATED_STATE.to_string()
}

pub fn default_start_timeout_ms() -> u64 {
    DEFAULT_START_TIMEOUT_MS
}

pub fn default_management_timeout_ms() -> u64 {
    DEFAULT_MANAGEMENT_TIMEOUT_MS
}

pub fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

pub fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}
