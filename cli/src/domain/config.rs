//! Domain types for labfleet configuration.
//!
//! Pure types only — no I/O, no async, no filesystem access.

use serde::{Deserialize, Serialize};

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_USER: &str = "root@pam";
pub const DEFAULT_NODE: &str = "pve";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.labfleet/config.yaml`.
///
/// Every field is optional in the file; unknown keys are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FleetConfig {
    pub connection: ConnectionConfig,
    pub clone: CloneConfig,
    pub teardown: TeardownConfig,
}

/// How to reach and talk to the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Platform endpoint, e.g. `https://pve.example.com:8006`.
    pub host: Option<String>,
    /// Authentication principal.
    pub user: String,
    /// Target node.
    pub node: String,
    /// Verify the host's TLS certificate. Lab hosts usually run self-signed.
    pub verify_tls: bool,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// How long to wait for an asynchronous platform task.
    pub task_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: DEFAULT_USER.to_string(),
            node: DEFAULT_NODE.to_string(),
            verify_tls: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CloneConfig {
    /// Full clones instead of linked clones.
    pub full: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TeardownConfig {
    /// Remove the zone during undo.
    pub remove_zone: bool,
}
