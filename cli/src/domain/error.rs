//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

use crate::domain::resource::{NetworkName, ResourceRef, VmId, ZoneName};

// ── Platform errors ───────────────────────────────────────────────────────────

/// Failure reported by a platform gateway call.
///
/// Adapters convert their transport and API errors into this enum so the
/// application layer never sees an HTTP client type.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("platform unreachable: {0}")]
    Unreachable(String),

    #[error("{method} {path} returned HTTP {status}: {message}")]
    Api {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {path}: {detail}")]
    Malformed { path: String, detail: String },

    #[error("credentials rejected for '{user}'")]
    Unauthorized { user: String },

    #[error("task {upid} finished with status '{exit_status}'")]
    TaskFailed { upid: String, exit_status: String },

    #[error("task {upid} did not finish within {seconds}s")]
    TaskTimeout { upid: String, seconds: u64 },
}

// ── Precondition errors ───────────────────────────────────────────────────────

/// Inputs or platform state that make a run impossible before any mutation.
#[derive(Debug, Error)]
pub enum PreconditionError {
    #[error("VM ID(s) already in use: {}. Choose another --starting_id.", join_ids(.ids))]
    IdCollision { ids: Vec<VmId> },

    #[error("at least one template is required")]
    EmptyTemplateList,

    #[error("{count} VMs starting at {start} exceed the VM ID range")]
    IdOverflow { start: VmId, count: usize },

    #[error("vnet '{network}' already exists in zone '{actual}', not '{expected}'")]
    NetworkZoneMismatch {
        network: NetworkName,
        expected: ZoneName,
        actual: ZoneName,
    },
}

fn join_ids(ids: &[VmId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Run errors ────────────────────────────────────────────────────────────────

/// Errors that abort a provisioning or teardown run.
///
/// Per-VM operation failures are not represented here: they are recorded in
/// the run report and never abort the run.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("authentication failed")]
    Authentication(#[source] GatewayError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("cannot determine whether {resource} exists")]
    QueryFailure {
        resource: ResourceRef,
        #[source]
        source: GatewayError,
    },

    #[error("could not create {resource}; aborting before later steps")]
    Infrastructure {
        resource: ResourceRef,
        #[source]
        source: GatewayError,
    },
}

// ── Validation errors ─────────────────────────────────────────────────────────

/// An identifier supplied on the command line or in config is malformed.
#[derive(Debug, Error)]
#[error("invalid {kind} '{value}': {rule}")]
pub struct ValidationError {
    pub kind: &'static str,
    pub value: String,
    pub rule: &'static str,
}
