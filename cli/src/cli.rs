//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::{AppContext, OutputFlags};
use crate::application::ports::{ConfigStore, Credentials};
use crate::commands::{self, Aborted};
use crate::domain::config::FleetConfig;
use crate::domain::error::FleetError;
use crate::domain::fleet::{CloneOptions, FleetSpec, ProvisionRequest, TeardownRequest};
use crate::domain::resource::{NetworkName, NodeName, PoolId, TemplateId, VmId, ZoneName};
use crate::infra::config::YamlConfigStore;
use crate::infra::proxmox::{GatewayOptions, ProxmoxGateway};
use crate::output::json;

/// Provision and tear down lab VM fleets on Proxmox VE
///
/// Clones each template into consecutive VM IDs starting at --starting_id,
/// placing them in a resource pool and on an SDN vnet. Run it again to
/// finish an interrupted run; run it with --undo to remove the fleet.
#[derive(Debug, Parser)]
#[command(name = "labfleet", version)]
pub struct Cli {
    /// Proxmox host name or URL (port 8006 is assumed when none is given)
    #[arg(long, env = "LABFLEET_HOST")]
    pub host: Option<String>,

    /// Login principal [default: root@pam]
    #[arg(long, env = "LABFLEET_USER")]
    pub user: Option<String>,

    /// Password (prompted for when omitted)
    #[arg(long, env = "LABFLEET_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SDN vnet the VMs are attached to
    #[arg(long)]
    pub vnet: NetworkName,

    /// SDN zone the vnet belongs to
    #[arg(long)]
    pub zone: ZoneName,

    /// Resource pool the VMs are placed in
    #[arg(long = "resource_pool", alias = "resource-pool")]
    pub resource_pool: PoolId,

    /// VM ID of the first clone
    #[arg(long = "starting_id", alias = "starting-id")]
    pub starting_id: VmId,

    /// Template IDs to clone, in order
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    pub templates: Vec<TemplateId>,

    /// Node the fleet lives on [default: pve]
    #[arg(long = "node_name", alias = "node-name")]
    pub node_name: Option<NodeName>,

    /// Start the VMs after cloning
    #[arg(long = "power_on", alias = "power-on", conflicts_with = "undo")]
    pub power_on: bool,

    /// Remove the fleet instead of creating it
    #[arg(long)]
    pub undo: bool,

    /// With --undo, also remove the SDN zone
    #[arg(long = "remove_zone", alias = "remove-zone", requires = "undo")]
    pub remove_zone: bool,

    /// Make full clones instead of linked clones
    #[arg(long = "full_clone", alias = "full-clone", conflicts_with = "undo")]
    pub full_clone: bool,

    /// Verify the host's TLS certificate
    #[arg(long = "verify_tls", alias = "verify-tls")]
    pub verify_tls: bool,

    /// Log every decision and platform call to stderr
    #[arg(long)]
    pub debug: bool,

    /// Output the report in JSON format
    #[arg(long)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long = "no_color",
        alias = "no-color",
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Configuration file [default: ~/.labfleet/config.yaml]
    #[arg(long, env = "LABFLEET_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Connection and behaviour settings after merging flags, config, and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub user: String,
    pub node: NodeName,
    pub gateway: GatewayOptions,
    pub full_clone: bool,
    pub remove_zone: bool,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// In `--json` mode a failure is also printed to stdout as a JSON error
    /// object.
    ///
    /// # Errors
    ///
    /// Returns an error if the run aborts.
    pub async fn run(self) -> Result<ExitCode> {
        init_tracing(self.debug);
        let as_json = self.json;
        let result = self.execute().await;
        if as_json && let Err(e) = &result {
            let partial = e
                .downcast_ref::<Aborted>()
                .map(|a| &a.report)
                .filter(|r| !r.entries.is_empty());
            println!(
                "{}",
                json::format_error(&format!("{e:#}"), error_code(e), partial)?
            );
        }
        result
    }

    async fn execute(self) -> Result<ExitCode> {
        let app = AppContext::new(&OutputFlags {
            no_color: self.no_color,
            quiet: self.quiet,
            json: self.json,
            debug: self.debug,
        });

        let store = match &self.config {
            Some(path) => YamlConfigStore::at(path),
            None => YamlConfigStore::new(),
        };
        let config = store.load()?;
        let settings = self.settings(&config)?;
        let fleet = self.fleet(&settings);
        let credentials = Credentials {
            user: settings.user.clone(),
            password: self.password()?,
        };

        let gateway = ProxmoxGateway::new(&settings.host, &settings.gateway)?;
        let session = commands::authenticate(&gateway, &credentials, &app.reporter()).await?;

        if self.undo {
            let request = TeardownRequest {
                fleet,
                remove_zone: settings.remove_zone,
            };
            commands::undo::run(&app, &gateway, &session, &request).await
        } else {
            let request = ProvisionRequest {
                fleet,
                power_on: self.power_on,
                clone: CloneOptions {
                    full: settings.full_clone,
                },
            };
            commands::provision::run(&app, &gateway, &session, &request).await
        }
    }

    /// Merge flags (and their environment variables) over the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if no host is configured or the configured node name
    /// is invalid.
    pub fn settings(&self, config: &FleetConfig) -> Result<Settings> {
        let conn = &config.connection;
        let Some(host) = self
            .host
            .clone()
            .or_else(|| conn.host.clone())
            .filter(|h| !h.trim().is_empty())
        else {
            bail!("no Proxmox host given; pass --host, set LABFLEET_HOST, or set connection.host in the config file");
        };
        let node = match &self.node_name {
            Some(node) => node.clone(),
            None => conn
                .node
                .parse()
                .context("invalid connection.node in the config file")?,
        };
        Ok(Settings {
            host,
            user: self.user.clone().unwrap_or_else(|| conn.user.clone()),
            node,
            gateway: GatewayOptions {
                verify_tls: self.verify_tls || conn.verify_tls,
                request_timeout: Duration::from_secs(conn.request_timeout_secs),
                task_timeout: Duration::from_secs(conn.task_timeout_secs),
            },
            full_clone: self.full_clone || config.clone.full,
            remove_zone: self.remove_zone || config.teardown.remove_zone,
        })
    }

    /// Fleet identity from the flags.
    #[must_use]
    pub fn fleet(&self, settings: &Settings) -> FleetSpec {
        FleetSpec {
            node: settings.node.clone(),
            pool: self.resource_pool.clone(),
            zone: self.zone.clone(),
            network: self.vnet.clone(),
            templates: self.templates.clone(),
            starting_id: self.starting_id,
        }
    }

    fn password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        if !console::Term::stderr().is_term() {
            bail!("no password given; pass --password or set LABFLEET_PASSWORD");
        }
        dialoguer::Password::new()
            .with_prompt("Proxmox password")
            .interact()
            .context("cannot read password")
    }
}

/// Route `tracing` output to stderr. `RUST_LOG` overrides the default filter.
fn init_tracing(debug: bool) {
    let default = if debug {
        "labfleet_cli=debug"
    } else {
        "labfleet_cli=warn"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Stable error code for the JSON error object.
fn error_code(err: &anyhow::Error) -> &'static str {
    let fleet = err
        .downcast_ref::<Aborted>()
        .map(|a| &a.error)
        .or_else(|| err.downcast_ref::<FleetError>());
    match fleet {
        Some(FleetError::Authentication(_)) => "authentication",
        Some(FleetError::Precondition(_)) => "precondition",
        Some(FleetError::QueryFailure { .. }) => "query_failed",
        Some(FleetError::Infrastructure { .. }) => "infrastructure",
        None => "error",
    }
}
