//! Infrastructure implementation of the `PlatformGateway` port for the
//! Proxmox VE REST API (`/api2/json`).
//!
//! Every mutating endpoint that answers with a task UPID is followed until the
//! task stops, so callers observe completed operations only.

use std::time::Duration;

use anyhow::{Context, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, Method, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::application::ports::{CloneRequest, Credentials, PlatformGateway, Session};
use crate::domain::error::GatewayError;
use crate::domain::resource::{
    GuestKind, InfraResource, NetworkName, NetworkRecord, NodeName, PoolId, PoolRecord,
    PowerAction, PowerState, ResourceRecord, ResourceRef, TemplateId, VmId, VmRecord, ZoneRecord,
};

/// Default port of the Proxmox API proxy.
pub const DEFAULT_API_PORT: u16 = 8006;

/// Delay between two task status polls.
const TASK_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Path segment escaping: everything except unreserved characters.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Connection settings for [`ProxmoxGateway`].
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub verify_tls: bool,
    pub request_timeout: Duration,
    pub task_timeout: Duration,
}

/// Normalize a user-supplied host into an API origin.
///
/// `pve.lab` becomes `https://pve.lab:8006`. An explicit scheme or port is
/// kept as given. Trailing slashes are dropped.
#[must_use]
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        return host.to_string();
    }
    let authority = host.split('/').next().unwrap_or(host);
    if has_port(authority) {
        format!("https://{host}")
    } else {
        format!("https://{authority}:{DEFAULT_API_PORT}")
    }
}

fn has_port(authority: &str) -> bool {
    // Bracketed IPv6 literals carry their own colons.
    let tail = authority.rsplit(']').next().unwrap_or(authority);
    tail.rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

/// Node that runs a task, taken from its UPID (`UPID:<node>:...`).
fn upid_node(upid: &str) -> Option<&str> {
    let mut parts = upid.split(':');
    (parts.next()? == "UPID").then_some(())?;
    parts.next().filter(|node| !node.is_empty())
}

/// Value of the `net0` option that bridges the first NIC onto a vnet.
fn net0_value(network: &NetworkName) -> String {
    format!("model=virtio,bridge={network}")
}

/// Bridge named in a `net0` option such as `virtio=BC:24:11:..,bridge=vmbr0`.
fn bridge_of(net0: &str) -> Option<&str> {
    net0.split(',')
        .find_map(|opt| opt.trim().strip_prefix("bridge="))
        .filter(|b| !b.is_empty())
}

fn segment(s: &str) -> String {
    utf8_percent_encode(s, SEGMENT).to_string()
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct TicketData {
    username: String,
    ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    csrf_token: String,
}

#[derive(Debug, Deserialize)]
struct PoolEntry {
    poolid: String,
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    zone: String,
    #[serde(rename = "type")]
    zone_type: String,
}

#[derive(Debug, Deserialize)]
struct VnetEntry {
    vnet: String,
    zone: String,
}

#[derive(Debug, Deserialize)]
struct GuestEntry {
    vmid: u32,
    node: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pool: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    template: u8,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GuestConfig {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    net0: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    exitstatus: Option<String>,
}

fn malformed(path: &str, detail: impl ToString) -> GatewayError {
    GatewayError::Malformed {
        path: path.to_string(),
        detail: detail.to_string(),
    }
}

fn guest_record(path: &str, entry: GuestEntry) -> Result<VmRecord, GatewayError> {
    let id = VmId::new(entry.vmid)
        .ok_or_else(|| malformed(path, format!("guest ID {} out of range", entry.vmid)))?;
    let node: NodeName = entry.node.parse().map_err(|e| malformed(path, e))?;
    let pool = entry
        .pool
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<PoolId>())
        .transpose()
        .map_err(|e| malformed(path, e))?;
    Ok(VmRecord {
        id,
        node,
        name: entry.name,
        pool,
        power: PowerState::from_status(entry.status.as_deref().unwrap_or("unknown")),
        template: entry.template != 0,
        kind: GuestKind::from_type(entry.kind.as_deref().unwrap_or("qemu")),
    })
}

/// Pull a human-readable message out of an error response body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = json.get("message").and_then(Value::as_str) {
            return msg.trim().to_string();
        }
        if let Some(errors) = json.get("errors").and_then(Value::as_object) {
            let joined: Vec<String> = errors
                .iter()
                .map(|(k, v)| format!("{k}: {}", v.as_str().unwrap_or_default().trim()))
                .collect();
            if !joined.is_empty() {
                return joined.join("; ");
            }
        }
    }
    let body = body.trim();
    if !body.is_empty() && !body.starts_with('{') {
        return body.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

// ── Gateway ───────────────────────────────────────────────────────────────────

/// `PlatformGateway` backed by the Proxmox VE HTTP API.
pub struct ProxmoxGateway {
    client: Client,
    api: String,
    task_timeout: Duration,
}

impl ProxmoxGateway {
    /// Build a gateway for `host` (normalized with [`normalize_host`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(host: &str, options: &GatewayOptions) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!options.verify_tls)
            .timeout(options.request_timeout)
            .user_agent(concat!("labfleet/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("cannot build HTTP client")?;
        let api = format!("{}/api2/json", normalize_host(host));
        debug!(%api, verify_tls = options.verify_tls, "gateway configured");
        Ok(Self {
            client,
            api,
            task_timeout: options.task_timeout,
        })
    }

    /// Send one request and return the raw `data` member of the response.
    async fn call(
        &self,
        session: Option<&Session>,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let url = format!("{}{path}", self.api);
        let mut req = self.client.request(method.clone(), &url);
        if let Some(session) = session {
            req = req.header(header::COOKIE, format!("PVEAuthCookie={}", session.ticket()));
            if method != Method::GET {
                req = req.header("CSRFPreventionToken", session.csrf_token());
            }
        }
        if !params.is_empty() {
            req = if method == Method::GET || method == Method::DELETE {
                req.query(params)
            } else {
                req.form(params)
            };
        }

        debug!(%method, path, "request");
        let resp = req
            .send()
            .await
            .map_err(|e| GatewayError::Unreachable(format!("{url}: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GatewayError::Unreachable(format!("{url}: {e}")))?;
        debug!(%method, path, status = status.as_u16(), "response");

        if !status.is_success() {
            return Err(GatewayError::Api {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        let envelope: Envelope<Value> =
            serde_json::from_str(&body).map_err(|e| malformed(path, e))?;
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let data = self.call(Some(session), Method::GET, path, params).await?;
        serde_json::from_value(data).map_err(|e| malformed(path, e))
    }

    /// Send a mutating request and wait for the task it starts, if any.
    async fn mutate(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<(), GatewayError> {
        let data = self.call(Some(session), method, path, params).await?;
        match data {
            Value::String(upid) if upid.starts_with("UPID:") => {
                self.wait_for_task(session, &upid).await
            }
            _ => Ok(()),
        }
    }

    /// Poll a task until it stops, failing unless it exited cleanly.
    async fn wait_for_task(&self, session: &Session, upid: &str) -> Result<(), GatewayError> {
        let node = upid_node(upid).ok_or_else(|| malformed(upid, "not a task UPID"))?;
        let path = format!("/nodes/{}/tasks/{}/status", segment(node), segment(upid));
        let deadline = Instant::now() + self.task_timeout;
        loop {
            let status: TaskStatus = self.get(session, &path, &[]).await?;
            if status.status == "stopped" {
                let exit = status.exitstatus.unwrap_or_else(|| "unknown".to_string());
                if exit == "OK" {
                    debug!(upid, "task finished");
                    return Ok(());
                }
                if exit.starts_with("WARNINGS") {
                    warn!(upid, exit_status = %exit, "task finished with warnings");
                    return Ok(());
                }
                return Err(GatewayError::TaskFailed {
                    upid: upid.to_string(),
                    exit_status: exit,
                });
            }
            if Instant::now() >= deadline {
                return Err(GatewayError::TaskTimeout {
                    upid: upid.to_string(),
                    seconds: self.task_timeout.as_secs(),
                });
            }
            sleep(TASK_POLL_INTERVAL).await;
        }
    }

    /// Commit pending SDN configuration to the nodes.
    async fn apply_sdn(&self, session: &Session) -> Result<(), GatewayError> {
        debug!("applying SDN configuration");
        self.mutate(session, Method::PUT, "/cluster/sdn", &[]).await
    }

    async fn find_guest(
        &self,
        session: &Session,
        id: VmId,
    ) -> Result<Option<VmRecord>, GatewayError> {
        let path = "/cluster/resources";
        let guests: Vec<GuestEntry> = self
            .get(session, path, &[("type", "vm".to_string())])
            .await?;
        guests
            .into_iter()
            .find(|g| g.vmid == id.get())
            .map(|g| guest_record(path, g))
            .transpose()
    }
}

impl PlatformGateway for ProxmoxGateway {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, GatewayError> {
        let path = "/access/ticket";
        let params = [
            ("username", credentials.user.clone()),
            ("password", credentials.password.clone()),
        ];
        let data = match self.call(None, Method::POST, path, &params).await {
            Err(GatewayError::Api { status, .. })
                if status == StatusCode::UNAUTHORIZED.as_u16() =>
            {
                return Err(GatewayError::Unauthorized {
                    user: credentials.user.clone(),
                });
            }
            other => other?,
        };
        let ticket: TicketData = serde_json::from_value(data).map_err(|e| malformed(path, e))?;
        debug!(user = %ticket.username, "authenticated");
        Ok(Session::new(ticket.username, ticket.ticket, ticket.csrf_token))
    }

    async fn lookup(
        &self,
        session: &Session,
        resource: &ResourceRef,
    ) -> Result<Option<ResourceRecord>, GatewayError> {
        match resource {
            ResourceRef::Pool { id } => {
                let path = "/pools";
                let pools: Vec<PoolEntry> = self.get(session, path, &[]).await?;
                pools
                    .into_iter()
                    .find(|p| p.poolid == id.as_str())
                    .map(|p| -> Result<_, GatewayError> {
                        Ok(ResourceRecord::Pool(PoolRecord {
                            id: p.poolid.parse().map_err(|e| malformed(path, e))?,
                        }))
                    })
                    .transpose()
            }
            ResourceRef::Zone { name } => {
                let path = "/cluster/sdn/zones";
                let zones: Vec<ZoneEntry> = self.get(session, path, &[]).await?;
                zones
                    .into_iter()
                    .find(|z| z.zone == name.as_str())
                    .map(|z| -> Result<_, GatewayError> {
                        Ok(ResourceRecord::Zone(ZoneRecord {
                            name: z.zone.parse().map_err(|e| malformed(path, e))?,
                            zone_type: z.zone_type,
                        }))
                    })
                    .transpose()
            }
            ResourceRef::Network { name, .. } => {
                let path = "/cluster/sdn/vnets";
                let vnets: Vec<VnetEntry> = self.get(session, path, &[]).await?;
                vnets
                    .into_iter()
                    .find(|v| v.vnet == name.as_str())
                    .map(|v| -> Result<_, GatewayError> {
                        Ok(ResourceRecord::Network(NetworkRecord {
                            name: v.vnet.parse().map_err(|e| malformed(path, e))?,
                            zone: v.zone.parse().map_err(|e| malformed(path, e))?,
                        }))
                    })
                    .transpose()
            }
            ResourceRef::Vm { id, .. } => {
                Ok(self.find_guest(session, *id).await?.map(ResourceRecord::Vm))
            }
        }
    }

    async fn create(
        &self,
        session: &Session,
        resource: &InfraResource,
    ) -> Result<(), GatewayError> {
        match resource {
            InfraResource::Pool(id) => {
                self.mutate(session, Method::POST, "/pools", &[("poolid", id.to_string())])
                    .await
            }
            InfraResource::Zone(name) => {
                let params = [("zone", name.to_string()), ("type", "simple".to_string())];
                self.mutate(session, Method::POST, "/cluster/sdn/zones", &params)
                    .await?;
                self.apply_sdn(session).await
            }
            InfraResource::Network { name, zone } => {
                let params = [("vnet", name.to_string()), ("zone", zone.to_string())];
                self.mutate(session, Method::POST, "/cluster/sdn/vnets", &params)
                    .await?;
                self.apply_sdn(session).await
            }
        }
    }

    async fn remove(&self, session: &Session, resource: &ResourceRef) -> Result<(), GatewayError> {
        match resource {
            ResourceRef::Pool { id } => {
                let path = format!("/pools/{}", segment(id.as_str()));
                self.mutate(session, Method::DELETE, &path, &[]).await
            }
            ResourceRef::Zone { name } => {
                let path = format!("/cluster/sdn/zones/{}", segment(name.as_str()));
                self.mutate(session, Method::DELETE, &path, &[]).await?;
                self.apply_sdn(session).await
            }
            ResourceRef::Network { name, .. } => {
                let path = format!("/cluster/sdn/vnets/{}", segment(name.as_str()));
                self.mutate(session, Method::DELETE, &path, &[]).await?;
                self.apply_sdn(session).await
            }
            ResourceRef::Vm { id, node } => {
                let path = format!("/nodes/{}/qemu/{id}", segment(node.as_str()));
                let params = [
                    ("purge", "1".to_string()),
                    ("destroy-unreferenced-disks", "1".to_string()),
                ];
                self.mutate(session, Method::DELETE, &path, &params).await
            }
        }
    }

    async fn clone_vm(&self, session: &Session, request: &CloneRequest) -> Result<(), GatewayError> {
        let path = format!(
            "/nodes/{}/qemu/{}/clone",
            segment(request.node.as_str()),
            request.template
        );
        let params = [
            ("newid", request.target.to_string()),
            ("name", request.name.clone()),
            ("pool", request.pool.to_string()),
            ("full", u8::from(request.full).to_string()),
        ];
        self.mutate(session, Method::POST, &path, &params).await
    }

    async fn attach_network(
        &self,
        session: &Session,
        node: &NodeName,
        vm: VmId,
        network: &NetworkName,
    ) -> Result<(), GatewayError> {
        let path = format!("/nodes/{}/qemu/{vm}/config", segment(node.as_str()));
        self.mutate(session, Method::POST, &path, &[("net0", net0_value(network))])
            .await
    }

    async fn power(
        &self,
        session: &Session,
        node: &NodeName,
        vm: VmId,
        action: PowerAction,
    ) -> Result<(), GatewayError> {
        let path = format!(
            "/nodes/{}/qemu/{vm}/status/{}",
            segment(node.as_str()),
            action.as_str()
        );
        self.mutate(session, Method::POST, &path, &[]).await
    }

    async fn template_name(
        &self,
        session: &Session,
        node: &NodeName,
        template: TemplateId,
    ) -> Result<Option<String>, GatewayError> {
        let path = format!("/nodes/{}/qemu/{template}/config", segment(node.as_str()));
        let config: GuestConfig = self.get(session, &path, &[]).await?;
        Ok(config.name.filter(|n| !n.is_empty()))
    }

    async fn vm_network(
        &self,
        session: &Session,
        node: &NodeName,
        vm: VmId,
    ) -> Result<Option<String>, GatewayError> {
        let path = format!("/nodes/{}/qemu/{vm}/config", segment(node.as_str()));
        let config: GuestConfig = self.get(session, &path, &[]).await?;
        Ok(config
            .net0
            .as_deref()
            .and_then(bridge_of)
            .map(str::to_string))
    }
}
