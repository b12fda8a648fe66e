//! Fleet identity and the inputs of the two orchestrators.
//!
//! A [`FleetSpec`] is everything needed to recompute the names and IDs a
//! provisioning run touches. Teardown takes the same spec and never relies on
//! a record of what provisioning did.

use crate::domain::resource::{
    InfraResource, NetworkName, NodeName, PoolId, ResourceRef, TemplateId, VmId, ZoneName,
};

/// Identifying parameters shared by provisioning and teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetSpec {
    pub node: NodeName,
    pub pool: PoolId,
    pub zone: ZoneName,
    pub network: NetworkName,
    /// Ordered; the n-th template is cloned into `starting_id + n`.
    pub templates: Vec<TemplateId>,
    pub starting_id: VmId,
}

impl FleetSpec {
    #[must_use]
    pub fn pool(&self) -> InfraResource {
        InfraResource::Pool(self.pool.clone())
    }

    #[must_use]
    pub fn zone(&self) -> InfraResource {
        InfraResource::Zone(self.zone.clone())
    }

    #[must_use]
    pub fn network(&self) -> InfraResource {
        InfraResource::Network {
            name: self.network.clone(),
            zone: self.zone.clone(),
        }
    }

    #[must_use]
    pub fn vm_ref(&self, id: VmId) -> ResourceRef {
        ResourceRef::Vm {
            id,
            node: self.node.clone(),
        }
    }

    /// Templates listed more than once, in first-seen order.
    #[must_use]
    pub fn duplicate_templates(&self) -> Vec<TemplateId> {
        let mut seen = Vec::new();
        let mut dups = Vec::new();
        for t in &self.templates {
            if seen.contains(t) {
                if !dups.contains(t) {
                    dups.push(*t);
                }
            } else {
                seen.push(*t);
            }
        }
        dups
    }
}

/// Clone behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Full copy instead of a linked clone.
    pub full: bool,
}

/// Input of the provisioning orchestrator.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub fleet: FleetSpec,
    pub power_on: bool,
    pub clone: CloneOptions,
}

/// Input of the teardown orchestrator.
#[derive(Debug, Clone)]
pub struct TeardownRequest {
    pub fleet: FleetSpec,
    /// Also remove the zone when no vnet references it any more.
    pub remove_zone: bool,
}
