//! # Reachability Prober
//!
//! Finds which addresses of a /24 answer at all. Every candidate is probed
//! concurrently under a shared concurrency limit, and each probe is cut off
//! after the configured timeout so one silent host never stalls the sweep.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use doorlink_common::config::ProbeConfig;
use doorlink_common::network::subnet::Subnet;
use doorlink_common::{Error, Result};
use is_root::is_root;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::network::{tcp, transport::Pinger};

/// Answers whether a single address is up.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_alive(&self, addr: Ipv4Addr) -> bool;
}

/// Probes with ICMP echo and a TCP handshake at the same time; either
/// answer marks the host alive.
///
/// Without raw socket privileges only the TCP check runs.
pub struct NetworkProbe {
    pinger: Option<Pinger>,
    tcp_port: u16,
    timeout: Duration,
}

impl NetworkProbe {
    /// Must be called inside a tokio runtime when ICMP is enabled.
    pub fn new(cfg: &ProbeConfig) -> Self {
        let pinger = if cfg.use_icmp { start_pinger() } else { None };
        Self {
            pinger,
            tcp_port: cfg.tcp_port,
            timeout: cfg.timeout,
        }
    }

    pub fn tcp_only(cfg: &ProbeConfig) -> Self {
        Self {
            pinger: None,
            tcp_port: cfg.tcp_port,
            timeout: cfg.timeout,
        }
    }

    pub fn uses_icmp(&self) -> bool {
        self.pinger.is_some()
    }
}

fn start_pinger() -> Option<Pinger> {
    if !is_root() {
        debug!("not running as root, probing with TCP only");
        return None;
    }
    match Pinger::start() {
        Ok(pinger) => Some(pinger),
        Err(e) => {
            warn!("ICMP unavailable, probing with TCP only: {e:#}");
            None
        }
    }
}

#[async_trait]
impl LivenessProbe for NetworkProbe {
    async fn is_alive(&self, addr: Ipv4Addr) -> bool {
        let tcp = tcp::handshake_probe(addr, self.tcp_port, self.timeout);
        let Some(pinger) = &self.pinger else {
            return tcp.await;
        };

        let icmp = async { timeout(self.timeout, pinger.ping(addr)).await.unwrap_or(false) };
        tokio::pin!(tcp, icmp);

        let (mut tcp_done, mut icmp_done) = (false, false);
        loop {
            tokio::select! {
                alive = &mut icmp, if !icmp_done => {
                    if alive {
                        return true;
                    }
                    icmp_done = true;
                }
                alive = &mut tcp, if !tcp_done => {
                    if alive {
                        return true;
                    }
                    tcp_done = true;
                }
                else => return false,
            }
        }
    }
}

/// Addresses of one subnet that answered a probe, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachableHostSet {
    subnet: Subnet,
    hosts: BTreeSet<Ipv4Addr>,
}

impl ReachableHostSet {
    pub fn new(subnet: Subnet, hosts: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        Self {
            subnet,
            hosts: hosts.into_iter().filter(|addr| subnet.contains(addr)).collect(),
        }
    }

    pub fn subnet(&self) -> Subnet {
        self.subnet
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ipv4Addr> {
        self.hosts.iter()
    }

    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        self.hosts.contains(addr)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

pub type OnHostFound = Box<dyn Fn(Ipv4Addr) + Send + Sync>;

pub struct ReachabilityProber {
    probe: Arc<dyn LivenessProbe>,
    timeout: Duration,
    max_concurrent: usize,
    on_host_found: Option<OnHostFound>,
}

impl ReachabilityProber {
    pub fn new(probe: Arc<dyn LivenessProbe>, cfg: &ProbeConfig) -> Self {
        Self {
            probe,
            timeout: cfg.timeout,
            max_concurrent: cfg.max_concurrent.max(1),
            on_host_found: None,
        }
    }

    /// Called once for every host as soon as it answers.
    pub fn with_progress(mut self, on_host_found: OnHostFound) -> Self {
        self.on_host_found = Some(on_host_found);
        self
    }

    /// Probes `.1` through `.254` of `subnet`.
    ///
    /// Never fails: hosts that error or stay silent are simply absent from
    /// the result.
    pub async fn scan(&self, subnet: Subnet) -> ReachableHostSet {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut probes: JoinSet<Option<Ipv4Addr>> = JoinSet::new();

        info!(%subnet, "probing {} addresses", subnet.len());

        for addr in subnet.hosts() {
            let probe = self.probe.clone();
            let semaphore = semaphore.clone();
            let probe_timeout = self.timeout;

            probes.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match probe_once(probe.as_ref(), addr, probe_timeout).await {
                    Ok(true) => Some(addr),
                    Ok(false) => None,
                    Err(e) => {
                        trace!(%addr, "{e}");
                        None
                    }
                }
            });
        }

        let mut hosts = BTreeSet::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(Some(addr)) => {
                    debug!(%addr, "host is reachable");
                    if let Some(callback) = &self.on_host_found {
                        callback(addr);
                    }
                    hosts.insert(addr);
                }
                Ok(None) => {}
                Err(e) => debug!(%e, "probe task failed"),
            }
        }

        info!(%subnet, reachable = hosts.len(), "subnet probe finished");
        ReachableHostSet::new(subnet, hosts)
    }
}

async fn probe_once(probe: &dyn LivenessProbe, addr: Ipv4Addr, limit: Duration) -> Result<bool> {
    timeout(limit, probe.is_alive(addr))
        .await
        .map_err(|_| Error::ProbeTimeout)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
