//! Application service — fleet provisioning use-case.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! Order: pool → zone → vnet → ID allocation → clones → optional power-on.
//! Every step re-resolves existence, so the whole run is safe to repeat.

use tracing::{debug, warn};

use crate::application::ports::{CloneRequest, PlatformGateway, ProgressReporter, Session};
use crate::application::services::allocator::allocate;
use crate::application::services::resolver::Resolver;
use crate::domain::allocation::{Claim, TargetVm};
use crate::domain::error::{FleetError, GatewayError, PreconditionError};
use crate::domain::fleet::{FleetSpec, ProvisionRequest};
use crate::domain::report::{Action, Operation, Report, Step};
use crate::domain::resource::{InfraResource, PowerAction, PowerState, VmId};

/// Provision the fleet described by `request`.
///
/// Pool, zone, and vnet failures abort the run. Clone and power-on failures
/// are recorded per VM and the run continues.
///
/// # Errors
///
/// - `QueryFailure` if pool, zone, vnet, or any target ID cannot be resolved.
/// - `Infrastructure` if pool, zone, or vnet creation fails.
/// - `Precondition` for an ID collision or a vnet bound to another zone.
pub async fn provision(
    gateway: &impl PlatformGateway,
    session: &Session,
    request: &ProvisionRequest,
    reporter: &impl ProgressReporter,
) -> Result<Report, FleetError> {
    let mut report = Report::new(Operation::Provision);
    provision_into(gateway, session, request, reporter, &mut report).await?;
    Ok(report)
}

/// Like [`provision`], but records into `report` so that whatever was done
/// before an abort is still available to the caller.
///
/// # Errors
///
/// Same as [`provision`]. `report` holds the entries recorded up to the abort.
pub async fn provision_into(
    gateway: &impl PlatformGateway,
    session: &Session,
    request: &ProvisionRequest,
    reporter: &impl ProgressReporter,
    report: &mut Report,
) -> Result<(), FleetError> {
    let fleet = &request.fleet;
    let resolver = Resolver::new(gateway, session);

    for template in fleet.duplicate_templates() {
        warn!(%template, "template listed more than once");
        reporter.warn(&format!("template {template} is listed more than once"));
    }

    // Step 1: Pool.
    let pool = fleet.pool();
    reporter.step(&format!("checking {}", pool.to_ref()));
    let present = resolver
        .resolve_pool(&fleet.pool)
        .await
        .into_result(&pool.to_ref())?
        .is_some();
    ensure(gateway, session, &pool, present, report).await?;

    // Step 2: Zone.
    let zone = fleet.zone();
    reporter.step(&format!("checking {}", zone.to_ref()));
    let present = resolver
        .resolve_zone(&fleet.zone)
        .await
        .into_result(&zone.to_ref())?
        .is_some();
    ensure(gateway, session, &zone, present, report).await?;

    // Step 3: Vnet, scoped to the zone.
    let network = fleet.network();
    reporter.step(&format!("checking {}", network.to_ref()));
    let existing = resolver
        .resolve_network(&fleet.network, &fleet.zone)
        .await
        .into_result(&network.to_ref())?;
    if let Some(record) = &existing
        && record.zone != fleet.zone
    {
        return Err(PreconditionError::NetworkZoneMismatch {
            network: fleet.network.clone(),
            expected: fleet.zone.clone(),
            actual: record.zone.clone(),
        }
        .into());
    }
    ensure(gateway, session, &network, existing.is_some(), report).await?;

    // Step 4: Allocate target IDs. Nothing is cloned unless every ID is usable.
    reporter.step("checking target VM IDs");
    let allocation = allocate(&resolver, fleet).await?;

    // Step 5: Clone into free slots; make sure earlier clones sit on the vnet.
    let mut power_candidates: Vec<(VmId, PowerState)> = Vec::new();
    for (target, claim) in &allocation.slots {
        let vm = fleet.vm_ref(target.id);
        match claim {
            Claim::Provisioned(record) => {
                debug!(id = %target.id, "already provisioned, skipping clone");
                report.record(vm.clone(), Action::AlreadyExists);
                match reattach(gateway, session, fleet, target.id).await {
                    Ok(attached) => {
                        if attached {
                            report.record(vm, Action::Attached);
                        }
                        power_candidates.push((target.id, record.power));
                    }
                    Err((step, e)) => {
                        warn!(id = %target.id, step = step.as_str(), error = %e, "VM failed");
                        report.record(vm, Action::failed(step, &e));
                    }
                }
            }
            Claim::Free => {
                reporter.step(&format!(
                    "cloning template {} into VM {}",
                    target.template, target.id
                ));
                match clone_one(gateway, session, request, target).await {
                    Ok(()) => {
                        report.record(vm, Action::Created);
                        power_candidates.push((target.id, PowerState::Stopped));
                    }
                    Err((step, e)) => {
                        warn!(id = %target.id, step = step.as_str(), error = %e, "VM failed");
                        report.record(vm, Action::failed(step, &e));
                    }
                }
            }
        }
    }

    // Step 6: Power on. Paused VMs are resumed rather than started.
    if request.power_on {
        for (id, power) in power_candidates {
            let vm = fleet.vm_ref(id);
            let action = match power {
                PowerState::Running => {
                    report.record(vm, Action::AlreadyRunning);
                    continue;
                }
                PowerState::Paused => PowerAction::Resume,
                PowerState::Stopped => PowerAction::Start,
            };
            reporter.step(&format!("starting VM {id}"));
            debug!(%id, action = action.as_str(), "powering on");
            match gateway.power(session, &fleet.node, id, action).await {
                Ok(()) => report.record(vm, Action::PoweredOn),
                Err(e) => {
                    warn!(%id, error = %e, "power on failed");
                    report.record(vm, Action::failed(Step::PowerOn, &e));
                }
            }
        }
    }

    Ok(())
}

/// Create `resource` unless it is already present, recording the outcome.
async fn ensure(
    gateway: &impl PlatformGateway,
    session: &Session,
    resource: &InfraResource,
    present: bool,
    report: &mut Report,
) -> Result<(), FleetError> {
    let r = resource.to_ref();
    if present {
        report.record(r, Action::AlreadyExists);
        return Ok(());
    }
    debug!(resource = %r, "creating");
    gateway
        .create(session, resource)
        .await
        .map_err(|source| FleetError::Infrastructure {
            resource: r.clone(),
            source,
        })?;
    debug!(resource = %r, "created");
    report.record(r, Action::Created);
    Ok(())
}

/// Clone one template and attach the fleet's vnet.
async fn clone_one(
    gateway: &impl PlatformGateway,
    session: &Session,
    request: &ProvisionRequest,
    target: &TargetVm,
) -> Result<(), (Step, GatewayError)> {
    let fleet = &request.fleet;
    let name = clone_name(gateway, session, fleet, target).await;
    let clone = CloneRequest {
        node: fleet.node.clone(),
        template: target.template,
        target: target.id,
        name,
        pool: fleet.pool.clone(),
        full: request.clone.full,
    };
    debug!(?clone, "cloning");
    gateway
        .clone_vm(session, &clone)
        .await
        .map_err(|e| (Step::Clone, e))?;
    debug!(id = %target.id, network = %fleet.network, "attaching network");
    gateway
        .attach_network(session, &fleet.node, target.id, &fleet.network)
        .await
        .map_err(|e| (Step::AttachNetwork, e))?;
    Ok(())
}

/// Attach an existing fleet VM to the fleet vnet unless it is already there.
/// Returns whether an attach was needed.
async fn reattach(
    gateway: &impl PlatformGateway,
    session: &Session,
    fleet: &FleetSpec,
    id: VmId,
) -> Result<bool, (Step, GatewayError)> {
    let bridge = gateway
        .vm_network(session, &fleet.node, id)
        .await
        .map_err(|e| (Step::Resolve, e))?;
    if bridge.as_deref() == Some(fleet.network.as_str()) {
        return Ok(false);
    }
    debug!(%id, ?bridge, network = %fleet.network, "re-attaching network");
    gateway
        .attach_network(session, &fleet.node, id, &fleet.network)
        .await
        .map_err(|e| (Step::AttachNetwork, e))?;
    Ok(true)
}

/// Clones take their template's name, or `template-<id>` when it has none.
async fn clone_name(
    gateway: &impl PlatformGateway,
    session: &Session,
    fleet: &FleetSpec,
    target: &TargetVm,
) -> String {
    let fallback = format!("template-{}", target.template);
    match gateway
        .template_name(session, &fleet.node, target.template)
        .await
    {
        Ok(Some(name)) => name,
        Ok(None) => fallback,
        Err(e) => {
            debug!(template = %target.template, error = %e, "cannot read template name");
            fallback
        }
    }
}
