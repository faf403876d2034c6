//! # Host Resolver
//!
//! Maps a role to the device address that accepts its credentials:
//! reachability scan of the subnet (cached), then a credential sweep over
//! the reachable hosts.

use std::net::Ipv4Addr;
use std::sync::Arc;

use doorlink_common::config::RemoteRole;
use doorlink_common::network::subnet::Subnet;
use tracing::{info, warn};

use crate::cache::HostCache;
use crate::prober::{ReachabilityProber, ReachableHostSet};
use crate::validator::CredentialValidator;

pub struct HostResolver {
    subnet: Subnet,
    prober: ReachabilityProber,
    validator: CredentialValidator,
    cache: Arc<HostCache>,
}

impl HostResolver {
    pub fn new(
        subnet: Subnet,
        prober: ReachabilityProber,
        validator: CredentialValidator,
        cache: Arc<HostCache>,
    ) -> Self {
        Self {
            subnet,
            prober,
            validator,
            cache,
        }
    }

    pub fn subnet(&self) -> Subnet {
        self.subnet
    }

    pub async fn reachable_hosts(&self) -> Arc<ReachableHostSet> {
        self.cache.get_or_scan(self.subnet, &self.prober).await
    }

    /// Finds the host for `role` without touching the role itself.
    pub async fn resolve_host(&self, role: &RemoteRole) -> Option<Ipv4Addr> {
        let hosts = self.reachable_hosts().await;
        if hosts.is_empty() {
            warn!(subnet = %self.subnet, role = %role.name, "no reachable hosts to try");
            return None;
        }

        let found = self
            .validator
            .find_host(hosts.iter().copied(), &role.credentials)
            .await;

        match found {
            Some(host) => info!(role = %role.name, %host, "resolved host"),
            None => warn!(
                role = %role.name,
                candidates = hosts.len(),
                "no reachable host accepted the credentials"
            ),
        }
        found
    }

    /// Resolves `role` and stores the outcome in it. A failed resolution
    /// clears any previous address.
    pub async fn resolve(&self, role: &mut RemoteRole) -> Option<Ipv4Addr> {
        role.host = self.resolve_host(role).await;
        role.host
    }

    /// Drops the cached scan so the next resolution probes the network again.
    pub async fn invalidate(&self) {
        self.cache.invalidate(self.subnet).await;
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
