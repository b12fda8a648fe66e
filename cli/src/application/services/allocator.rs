//! Identifier allocator — checks the target ID range against the platform.
//!
//! Read-only: it only resolves, never mutates.

use tracing::debug;

use crate::application::ports::PlatformGateway;
use crate::application::services::resolver::Resolver;
use crate::domain::allocation::{Allocation, Slot, classify, target_range};
use crate::domain::error::FleetError;
use crate::domain::fleet::FleetSpec;

/// Allocate `starting_id ..` for every template of the fleet.
///
/// Each candidate ID is resolved. IDs held by a VM of this fleet (same node,
/// same pool) are returned as already provisioned; IDs held by any other VM
/// fail the whole allocation.
///
/// # Errors
///
/// - `Precondition(EmptyTemplateList | IdOverflow)` for an impossible range.
/// - `QueryFailure` if any candidate cannot be resolved.
/// - `Precondition(IdCollision)` naming every conflicting ID.
pub async fn allocate<G: PlatformGateway>(
    resolver: &Resolver<'_, G>,
    fleet: &FleetSpec,
) -> Result<Allocation, FleetError> {
    let targets = target_range(fleet.starting_id, &fleet.templates)?;
    let mut slots = Vec::with_capacity(targets.len());
    for target in targets {
        let vm = fleet.vm_ref(target.id);
        let record = resolver
            .resolve_vm(target.id, &fleet.node)
            .await
            .into_result(&vm)?;
        let slot = classify(record, fleet);
        match &slot {
            Slot::Free => debug!(id = %target.id, "slot free"),
            Slot::Provisioned(_) => debug!(id = %target.id, "slot already holds a fleet VM"),
            Slot::Foreign(r) => debug!(
                id = %target.id,
                node = %r.node,
                pool = ?r.pool.as_ref().map(ToString::to_string),
                "slot held by a foreign VM"
            ),
        }
        slots.push((target, slot));
    }
    Ok(Allocation::from_slots(slots)?)
}
