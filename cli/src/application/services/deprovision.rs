//! Application service — fleet teardown use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//!
//! Order: VMs → vnet → pool → zone (kept unless explicitly requested).
//! Targets are recomputed from the fleet spec; nothing recorded by a previous
//! provisioning run is consulted.

use tracing::{debug, warn};

use crate::application::ports::{PlatformGateway, ProgressReporter, Session};
use crate::application::services::resolver::{Resolution, Resolver};
use crate::domain::allocation::target_range;
use crate::domain::error::{FleetError, GatewayError};
use crate::domain::fleet::TeardownRequest;
use crate::domain::report::{Action, Operation, Report, Step};
use crate::domain::resource::{GuestKind, NodeName, PowerAction, ResourceRef, VmRecord};

/// Tear down the fleet described by `request`.
///
/// Absent resources are skipped, so the run is idempotent. Failed lookups and
/// removals are recorded per resource and never stop later steps.
///
/// # Errors
///
/// Returns `Precondition` only if the target range itself cannot be computed.
pub async fn deprovision(
    gateway: &impl PlatformGateway,
    session: &Session,
    request: &TeardownRequest,
    reporter: &impl ProgressReporter,
) -> Result<Report, FleetError> {
    let fleet = &request.fleet;
    let resolver = Resolver::new(gateway, session);
    let mut report = Report::new(Operation::Teardown);

    // Step 1: Recompute targets. No collision check: they need not be free.
    let targets = target_range(fleet.starting_id, &fleet.templates)?;

    // Step 2: VMs.
    for target in &targets {
        let vm = fleet.vm_ref(target.id);
        reporter.step(&format!("checking VM {}", target.id));
        let action = match resolver.resolve_vm(target.id, &fleet.node).await {
            Resolution::Absent => Action::AlreadyAbsent,
            Resolution::QueryFailed(e) => Action::failed(Step::Resolve, &e),
            Resolution::Present(record) if record.node != fleet.node => Action::Retained {
                reason: format!("runs on node {}, not {}", record.node, fleet.node),
            },
            Resolution::Present(record) if record.template => Action::Retained {
                reason: "is a template".to_string(),
            },
            Resolution::Present(record) if record.kind == GuestKind::Container => {
                Action::Retained {
                    reason: "is a container".to_string(),
                }
            }
            Resolution::Present(record) => {
                reporter.step(&format!("removing VM {}", target.id));
                match remove_vm(gateway, session, &fleet.node, &record).await {
                    Ok(()) => Action::Removed,
                    Err((step, e)) => {
                        warn!(id = %target.id, step = step.as_str(), error = %e, "VM removal failed");
                        Action::failed(step, &e)
                    }
                }
            }
        };
        report.record(vm, action);
    }

    // Step 3: Vnet, only if bound to the fleet's zone.
    let network = fleet.network().to_ref();
    reporter.step(&format!("checking {network}"));
    let action = match resolver.resolve_network(&fleet.network, &fleet.zone).await {
        Resolution::Absent => Action::AlreadyAbsent,
        Resolution::QueryFailed(e) => Action::failed(Step::Resolve, &e),
        Resolution::Present(record) if record.zone != fleet.zone => Action::Retained {
            reason: format!("bound to zone {}", record.zone),
        },
        Resolution::Present(_) => remove(gateway, session, &network).await,
    };
    report.record(network, action);

    // Step 4: Pool.
    let pool = fleet.pool().to_ref();
    reporter.step(&format!("checking {pool}"));
    let action = match resolver.resolve_pool(&fleet.pool).await {
        Resolution::Absent => Action::AlreadyAbsent,
        Resolution::QueryFailed(e) => Action::failed(Step::Resolve, &e),
        Resolution::Present(_) => remove(gateway, session, &pool).await,
    };
    report.record(pool, action);

    // Step 5: Zone. Other vnets may share it, so it stays unless asked for.
    let zone = fleet.zone().to_ref();
    let action = match resolver.resolve_zone(&fleet.zone).await {
        Resolution::Absent => Action::AlreadyAbsent,
        Resolution::QueryFailed(e) => Action::failed(Step::Resolve, &e),
        Resolution::Present(_) if !request.remove_zone => Action::Retained {
            reason: "zones may be shared; pass --remove_zone to delete it".to_string(),
        },
        Resolution::Present(_) => remove(gateway, session, &zone).await,
    };
    report.record(zone, action);

    Ok(report)
}

/// Stop the VM if it is not halted, then remove it.
async fn remove_vm(
    gateway: &impl PlatformGateway,
    session: &Session,
    node: &NodeName,
    record: &VmRecord,
) -> Result<(), (Step, GatewayError)> {
    if record.power.needs_stop() {
        debug!(id = %record.id, power = ?record.power, "stopping before removal");
        gateway
            .power(session, node, record.id, PowerAction::Stop)
            .await
            .map_err(|e| (Step::Stop, e))?;
    }
    let vm = ResourceRef::Vm {
        id: record.id,
        node: node.clone(),
    };
    debug!(resource = %vm, "removing");
    gateway
        .remove(session, &vm)
        .await
        .map_err(|e| (Step::Remove, e))
}

async fn remove(
    gateway: &impl PlatformGateway,
    session: &Session,
    resource: &ResourceRef,
) -> Action {
    debug!(%resource, "removing");
    match gateway.remove(session, resource).await {
        Ok(()) => Action::Removed,
        Err(e) => {
            warn!(%resource, error = %e, "removal failed");
            Action::failed(Step::Remove, &e)
        }
    }
}
