//! Target ID range computation and slot classification.
//!
//! Pure functions only. The platform lookups that feed [`classify`] live in
//! the allocator service.

use crate::domain::error::PreconditionError;
use crate::domain::fleet::FleetSpec;
use crate::domain::resource::{GuestKind, TemplateId, VmId, VmRecord};

/// A VM the fleet should contain: new ID plus the template it is cloned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetVm {
    pub id: VmId,
    pub template: TemplateId,
}

/// Compute `starting_id ..= starting_id + N - 1` paired with the templates
/// in order.
///
/// # Errors
///
/// Returns an error if `templates` is empty or the range leaves the VM ID space.
pub fn target_range(
    starting_id: VmId,
    templates: &[TemplateId],
) -> Result<Vec<TargetVm>, PreconditionError> {
    if templates.is_empty() {
        return Err(PreconditionError::EmptyTemplateList);
    }
    templates
        .iter()
        .enumerate()
        .map(|(i, &template)| {
            starting_id
                .offset(i)
                .map(|id| TargetVm { id, template })
                .ok_or(PreconditionError::IdOverflow {
                    start: starting_id,
                    count: templates.len(),
                })
        })
        .collect()
}

/// State of one target ID as observed on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// No VM uses the ID.
    Free,
    /// A VM of this fleet already occupies the ID (left by an earlier run).
    Provisioned(VmRecord),
    /// Some other VM uses the ID.
    Foreign(VmRecord),
}

/// A VM occupies a slot of this fleet when it lives on the fleet's node and
/// is tagged with the fleet's pool. Templates and containers never count.
#[must_use]
pub fn is_fleet_member(record: &VmRecord, fleet: &FleetSpec) -> bool {
    !record.template
        && record.kind == GuestKind::Qemu
        && record.node == fleet.node
        && record.pool.as_ref() == Some(&fleet.pool)
}

/// Classify an observed VM (or its absence) for a target slot.
#[must_use]
pub fn classify(record: Option<VmRecord>, fleet: &FleetSpec) -> Slot {
    match record {
        None => Slot::Free,
        Some(r) if is_fleet_member(&r, fleet) => Slot::Provisioned(r),
        Some(r) => Slot::Foreign(r),
    }
}

/// A slot that may be used by the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// Clone into it.
    Free,
    /// Leave the existing fleet VM alone.
    Provisioned(VmRecord),
}

/// Result of a successful allocation: every target with a free or
/// already-provisioned slot, in template order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub slots: Vec<(TargetVm, Claim)>,
}

impl Allocation {
    /// Build an allocation, failing if any slot is foreign.
    ///
    /// # Errors
    ///
    /// Returns `IdCollision` naming every foreign ID.
    pub fn from_slots(slots: Vec<(TargetVm, Slot)>) -> Result<Self, PreconditionError> {
        let ids: Vec<VmId> = slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Foreign(_)))
            .map(|(t, _)| t.id)
            .collect();
        if !ids.is_empty() {
            return Err(PreconditionError::IdCollision { ids });
        }
        let slots = slots
            .into_iter()
            .filter_map(|(target, slot)| match slot {
                Slot::Free => Some((target, Claim::Free)),
                Slot::Provisioned(r) => Some((target, Claim::Provisioned(r))),
                Slot::Foreign(_) => None,
            })
            .collect();
        Ok(Self { slots })
    }

    /// Target IDs in order.
    #[must_use]
    pub fn ids(&self) -> Vec<VmId> {
        self.slots.iter().map(|(t, _)| t.id).collect()
    }
}
