//! Typed identifiers, resource references, and platform records.
//!
//! Pure types only — no I/O, no async. Platform adapters convert their wire
//! formats into [`ResourceRecord`] at the gateway boundary.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ValidationError;

/// Proxmox SDN zone and vnet IDs: lowercase letter, then up to 7 more
/// lowercase letters or digits.
pub static SDN_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z][a-z0-9]{0,7}$").expect("valid regex")
});

/// Pool IDs, including nested pools (`parent/child`).
pub static POOL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9_.\-]+(/[A-Za-z0-9_.\-]+)*$").expect("valid regex")
});

/// Node names are DNS labels.
pub static NODE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid regex")
});

// ── Guest IDs ─────────────────────────────────────────────────────────────────

/// Lowest guest ID Proxmox accepts.
pub const MIN_GUEST_ID: u32 = 100;
/// Highest guest ID Proxmox accepts.
pub const MAX_GUEST_ID: u32 = 999_999_999;

fn parse_guest_id(kind: &'static str, s: &str) -> Result<u32, ValidationError> {
    let invalid = |rule| ValidationError {
        kind,
        value: s.to_string(),
        rule,
    };
    let n: u32 = s.trim().parse().map_err(|_| invalid("not an integer"))?;
    if !(MIN_GUEST_ID..=MAX_GUEST_ID).contains(&n) {
        return Err(invalid("must be between 100 and 999999999"));
    }
    Ok(n)
}

/// Identifier of a VM on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VmId(u32);

impl VmId {
    /// Build a VM ID, returning `None` outside the guest ID range.
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        (MIN_GUEST_ID..=MAX_GUEST_ID).contains(&id).then_some(Self(id))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The ID `offset` positions after this one, if it is still a valid guest ID.
    #[must_use]
    pub fn offset(self, offset: usize) -> Option<Self> {
        let offset = u32::try_from(offset).ok()?;
        self.0.checked_add(offset).and_then(Self::new)
    }
}

impl FromStr for VmId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_guest_id("VM ID", s).map(Self)
    }
}

impl fmt::Display for VmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a VM template to clone from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(u32);

impl TemplateId {
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl FromStr for TemplateId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_guest_id("template ID", s).map(Self)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Names ─────────────────────────────────────────────────────────────────────

macro_rules! validated_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $re:ident, $rule:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if $re.is_match(s) {
                    Ok(Self(s.to_string()))
                } else {
                    Err(ValidationError {
                        kind: $kind,
                        value: s.to_string(),
                        rule: $rule,
                    })
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                v.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

validated_name!(
    /// SDN zone identifier.
    ZoneName,
    "zone",
    SDN_ID_RE,
    "1-8 lowercase letters or digits, starting with a letter"
);

validated_name!(
    /// SDN vnet identifier.
    NetworkName,
    "vnet",
    SDN_ID_RE,
    "1-8 lowercase letters or digits, starting with a letter"
);

validated_name!(
    /// Resource pool identifier.
    PoolId,
    "resource pool",
    POOL_ID_RE,
    "letters, digits, '_', '.', '-' (nested pools separated by '/')"
);

validated_name!(
    /// Cluster node name.
    NodeName,
    "node name",
    NODE_NAME_RE,
    "must be a DNS label"
);

// ── References ────────────────────────────────────────────────────────────────

/// Identity of one platform resource, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRef {
    Pool { id: PoolId },
    Zone { name: ZoneName },
    Network { name: NetworkName, zone: ZoneName },
    Vm { id: VmId, node: NodeName },
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool { id } => write!(f, "pool {id}"),
            Self::Zone { name } => write!(f, "zone {name}"),
            Self::Network { name, zone } => write!(f, "vnet {name} (zone {zone})"),
            Self::Vm { id, .. } => write!(f, "VM {id}"),
        }
    }
}

/// Shared infrastructure that is created through the generic `create` call.
///
/// VMs are not part of this enum: they only come into existence by cloning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfraResource {
    Pool(PoolId),
    /// Zones are always created with the `simple` type.
    Zone(ZoneName),
    Network { name: NetworkName, zone: ZoneName },
}

impl InfraResource {
    #[must_use]
    pub fn to_ref(&self) -> ResourceRef {
        match self {
            Self::Pool(id) => ResourceRef::Pool { id: id.clone() },
            Self::Zone(name) => ResourceRef::Zone { name: name.clone() },
            Self::Network { name, zone } => ResourceRef::Network {
                name: name.clone(),
                zone: zone.clone(),
            },
        }
    }
}

// ── Records ───────────────────────────────────────────────────────────────────

/// Observed power state of a VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerState {
    Running,
    Paused,
    Stopped,
}

impl PowerState {
    /// Map a platform status string. Anything not known to be halted counts
    /// as running so teardown always stops it first.
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        match status {
            "stopped" => Self::Stopped,
            "paused" | "suspended" => Self::Paused,
            _ => Self::Running,
        }
    }

    #[must_use]
    pub fn needs_stop(self) -> bool {
        self != Self::Stopped
    }
}

/// Power transition requested from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Start,
    Stop,
    /// Continue a paused VM.
    Resume,
}

impl PowerAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Resume => "resume",
        }
    }
}

/// Guest flavour behind a numeric ID. Containers share the ID space with VMs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestKind {
    Qemu,
    Container,
}

impl GuestKind {
    /// Map the platform's guest `type`. Only `lxc` is a container.
    #[must_use]
    pub fn from_type(kind: &str) -> Self {
        if kind == "lxc" {
            Self::Container
        } else {
            Self::Qemu
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRecord {
    pub id: PoolId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRecord {
    pub name: ZoneName,
    pub zone_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRecord {
    pub name: NetworkName,
    pub zone: ZoneName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    pub id: VmId,
    pub node: NodeName,
    pub name: Option<String>,
    pub pool: Option<PoolId>,
    pub power: PowerState,
    pub template: bool,
    pub kind: GuestKind,
}

/// What the platform reports for an existing resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRecord {
    Pool(PoolRecord),
    Zone(ZoneRecord),
    Network(NetworkRecord),
    Vm(VmRecord),
}
