//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` — never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;

use crate::domain::config::FleetConfig;
use crate::domain::error::GatewayError;
use crate::domain::resource::{
    InfraResource, NetworkName, NodeName, PoolId, PowerAction, ResourceRecord, ResourceRef,
    TemplateId, VmId,
};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Login principal and secret.
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authenticated session handle.
///
/// Created once by `authenticate` and passed by reference into every other
/// gateway call for the duration of one run.
#[derive(Clone)]
pub struct Session {
    principal: String,
    ticket: String,
    csrf_token: String,
}

impl Session {
    #[must_use]
    pub fn new(principal: String, ticket: String, csrf_token: String) -> Self {
        Self {
            principal,
            ticket,
            csrf_token,
        }
    }

    #[must_use]
    pub fn principal(&self) -> &str {
        &self.principal
    }

    #[must_use]
    pub fn ticket(&self) -> &str {
        &self.ticket
    }

    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("principal", &self.principal)
            .field("ticket", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Parameters for cloning one template into a new VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    pub node: NodeName,
    pub template: TemplateId,
    pub target: VmId,
    /// Name given to the new VM.
    pub name: String,
    pub pool: PoolId,
    /// Full copy instead of a linked clone.
    pub full: bool,
}

// ── Platform Port ─────────────────────────────────────────────────────────────

/// Narrow interface to the virtualization platform.
///
/// Mutating calls return only after the platform reports the operation as
/// finished, so callers can sequence them without polling.
#[allow(async_fn_in_trait)]
pub trait PlatformGateway {
    /// Open a session. Every other call requires the returned handle.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, GatewayError>;

    /// Look a resource up. `Ok(None)` means it does not exist.
    async fn lookup(
        &self,
        session: &Session,
        resource: &ResourceRef,
    ) -> Result<Option<ResourceRecord>, GatewayError>;

    /// Create a pool, zone, or vnet.
    async fn create(&self, session: &Session, resource: &InfraResource)
    -> Result<(), GatewayError>;

    /// Remove any resource, VMs included.
    async fn remove(&self, session: &Session, resource: &ResourceRef) -> Result<(), GatewayError>;

    /// Clone a template into a new VM tagged with a pool.
    async fn clone_vm(&self, session: &Session, request: &CloneRequest)
    -> Result<(), GatewayError>;

    /// Point the VM's first network interface at a vnet.
    async fn attach_network(
        &self,
        session: &Session,
        node: &NodeName,
        vm: VmId,
        network: &NetworkName,
    ) -> Result<(), GatewayError>;

    /// Start, stop, or resume a VM.
    async fn power(
        &self,
        session: &Session,
        node: &NodeName,
        vm: VmId,
        action: PowerAction,
    ) -> Result<(), GatewayError>;

    /// Display name of a template, if it has one.
    async fn template_name(
        &self,
        session: &Session,
        node: &NodeName,
        template: TemplateId,
    ) -> Result<Option<String>, GatewayError>;

    /// Bridge the VM's first network interface is attached to, if any.
    async fn vm_network(
        &self,
        session: &Session,
        node: &NodeName,
        vm: VmId,
    ) -> Result<Option<String>, GatewayError>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait — no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Configuration Port ────────────────────────────────────────────────────────

/// Abstracts loading the optional configuration file.
pub trait ConfigStore {
    /// Load the configuration, returning defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<FleetConfig>;

    /// Path of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if no path can be determined (no home directory).
    fn path(&self) -> Result<PathBuf>;
}
