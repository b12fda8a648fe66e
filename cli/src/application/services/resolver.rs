//! Resource resolver — read-only existence checks.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use tracing::debug;

use crate::application::ports::{PlatformGateway, Session};
use crate::domain::error::{FleetError, GatewayError};
use crate::domain::resource::{
    NetworkName, NetworkRecord, NodeName, PoolId, PoolRecord, ResourceRecord, ResourceRef, VmId,
    VmRecord, ZoneName, ZoneRecord,
};

/// Outcome of an existence check.
///
/// `QueryFailed` is distinct from `Absent`: it never means "safe to create".
#[derive(Debug)]
pub enum Resolution<T> {
    Present(T),
    Absent,
    QueryFailed(GatewayError),
}

impl<T> Resolution<T> {
    /// Collapse into `Option`, turning a failed query into `FleetError::QueryFailure`.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailure` naming `resource` if the query failed.
    pub fn into_result(self, resource: &ResourceRef) -> Result<Option<T>, FleetError> {
        match self {
            Self::Present(record) => Ok(Some(record)),
            Self::Absent => Ok(None),
            Self::QueryFailed(source) => Err(FleetError::QueryFailure {
                resource: resource.clone(),
                source,
            }),
        }
    }
}

/// Resolves resources against the platform through a borrowed session.
pub struct Resolver<'a, G: PlatformGateway> {
    gateway: &'a G,
    session: &'a Session,
}

impl<'a, G: PlatformGateway> Resolver<'a, G> {
    pub fn new(gateway: &'a G, session: &'a Session) -> Self {
        Self { gateway, session }
    }

    /// Resolve any resource reference.
    pub async fn resolve(&self, resource: &ResourceRef) -> Resolution<ResourceRecord> {
        let resolution = match self.gateway.lookup(self.session, resource).await {
            Ok(Some(record)) => Resolution::Present(record),
            Ok(None) => Resolution::Absent,
            Err(e) => Resolution::QueryFailed(e),
        };
        match &resolution {
            Resolution::Present(_) => debug!(%resource, "resolved: present"),
            Resolution::Absent => debug!(%resource, "resolved: absent"),
            Resolution::QueryFailed(e) => debug!(%resource, error = %e, "resolve failed"),
        }
        resolution
    }

    pub async fn resolve_pool(&self, id: &PoolId) -> Resolution<PoolRecord> {
        let resource = ResourceRef::Pool { id: id.clone() };
        self.resolve_as(&resource, |r| match r {
            ResourceRecord::Pool(p) => Some(p),
            _ => None,
        })
        .await
    }

    pub async fn resolve_zone(&self, name: &ZoneName) -> Resolution<ZoneRecord> {
        let resource = ResourceRef::Zone { name: name.clone() };
        self.resolve_as(&resource, |r| match r {
            ResourceRecord::Zone(z) => Some(z),
            _ => None,
        })
        .await
    }

    /// Resolve a vnet by name. A vnet bound to a different zone still
    /// resolves as present, carrying its actual zone.
    pub async fn resolve_network(
        &self,
        name: &NetworkName,
        zone: &ZoneName,
    ) -> Resolution<NetworkRecord> {
        let resource = ResourceRef::Network {
            name: name.clone(),
            zone: zone.clone(),
        };
        self.resolve_as(&resource, |r| match r {
            ResourceRecord::Network(n) => Some(n),
            _ => None,
        })
        .await
    }

    pub async fn resolve_vm(&self, id: VmId, node: &NodeName) -> Resolution<VmRecord> {
        let resource = ResourceRef::Vm {
            id,
            node: node.clone(),
        };
        self.resolve_as(&resource, |r| match r {
            ResourceRecord::Vm(v) => Some(v),
            _ => None,
        })
        .await
    }

    async fn resolve_as<T>(
        &self,
        resource: &ResourceRef,
        extract: impl FnOnce(ResourceRecord) -> Option<T>,
    ) -> Resolution<T> {
        match self.resolve(resource).await {
            Resolution::Present(record) => match extract(record) {
                Some(typed) => Resolution::Present(typed),
                None => Resolution::QueryFailed(GatewayError::Malformed {
                    path: resource.to_string(),
                    detail: "platform returned a record of another kind".to_string(),
                }),
            },
            Resolution::Absent => Resolution::Absent,
            Resolution::QueryFailed(e) => Resolution::QueryFailed(e),
        }
    }
}
