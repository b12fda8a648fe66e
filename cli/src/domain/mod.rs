//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod allocation;
pub mod config;
pub mod error;
pub mod fleet;
pub mod report;
pub mod resource;

pub use allocation::{Allocation, Claim, Slot, TargetVm, target_range};
pub use config::FleetConfig;
pub use error::{FleetError, GatewayError, PreconditionError, ValidationError};
pub use fleet::{CloneOptions, FleetSpec, ProvisionRequest, TeardownRequest};
pub use report::{Action, Operation, Report, ReportEntry, Step};
pub use resource::{
    GuestKind, InfraResource, NetworkName, NodeName, PoolId, PowerAction, PowerState,
    ResourceRecord, ResourceRef, TemplateId, VmId, VmRecord, ZoneName,
};
