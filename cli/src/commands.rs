pub mod action;
pub mod resolve;
pub mod scan;

use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use doorlink_common::config::{Config, RemoteRole};
use doorlink_common::network::{interface, subnet::Subnet};
use doorlink_core::cache::HostCache;
use doorlink_core::controller::DoorbellController;
use doorlink_core::prober::NetworkProbe;
use doorlink_core::remote::ssh::SshConnector;

#[derive(Parser)]
#[command(name = "doorlink", version)]
#[command(about = "Find the doorbell's devices on the LAN and drive them over SSH.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Network to search, e.g. 192.168.0 (default: the LAN of this machine)
    #[arg(long, global = true)]
    pub subnet: Option<Subnet>,

    /// Add or replace a role
    #[arg(long = "role", value_name = "NAME=USER:PASS[@HOST]", global = true)]
    pub roles: Vec<RemoteRole>,

    /// Per-host reachability timeout in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub probe_timeout: Option<u64>,

    /// Per-host login timeout in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub login_timeout: Option<u64>,

    /// Remote command timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub command_timeout: Option<u64>,

    /// Probe with TCP only, even when ICMP is available
    #[arg(long, global = true)]
    pub no_icmp: bool,

    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short, long, action = ArgAction::Count, global = true, conflicts_with = "verbose")]
    pub quiet: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the reachable hosts of a subnet
    #[command(alias = "s")]
    Scan {
        #[arg(value_name = "SUBNET")]
        network: Option<Subnet>,
    },
    /// Find the host of every role
    #[command(alias = "r")]
    Resolve,
    /// Open the door
    Open,
    /// Close the door
    Close,
    /// Start the live video feed
    Feed,
    /// Run a command on a role's device
    Exec {
        /// Role whose device runs the command, e.g. feed
        role: String,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Defaults overridden by the command line flags.
    pub fn config(&self) -> Config {
        let mut cfg = Config {
            subnet: self.subnet,
            ..Config::default()
        };

        for role in &self.roles {
            cfg.upsert_role(role.clone());
        }
        if let Some(ms) = self.probe_timeout {
            cfg.probe.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.login_timeout {
            cfg.shell.login_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = self.command_timeout {
            cfg.shell.command_timeout = Duration::from_secs(secs);
        }
        cfg.probe.use_icmp = !self.no_icmp;
        cfg
    }
}

pub fn target_subnet(explicit: Option<Subnet>) -> anyhow::Result<Subnet> {
    match explicit {
        Some(subnet) => Ok(subnet),
        None => Ok(interface::local_subnet()?),
    }
}

pub fn build_controller(cfg: &Config) -> anyhow::Result<DoorbellController> {
    let subnet = target_subnet(cfg.subnet)?;
    Ok(DoorbellController::from_config(
        cfg,
        subnet,
        Arc::new(NetworkProbe::new(&cfg.probe)),
        Arc::new(SshConnector::new(cfg.shell.port)),
        Arc::new(HostCache::new()),
    ))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
