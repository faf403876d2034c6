use std::collections::HashMap;
use std::sync::Arc;

use doorlink_common::network::subnet::Subnet;
use tokio::sync::Mutex;
use tracing::debug;

use crate::prober::{ReachabilityProber, ReachableHostSet};

/// Remembers the reachable hosts of each subnet so role resolution does not
/// re-scan the network for every role.
///
/// Concurrent callers for the same subnet share a single scan.
#[derive(Default)]
pub struct HostCache {
    scans: Mutex<HashMap<Subnet, Arc<ReachableHostSet>>>,
}

impl HostCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached set, scanning with `prober` on a miss. An empty
    /// result is cached like any other.
    pub async fn get_or_scan(&self, subnet: Subnet, prober: &ReachabilityProber) -> Arc<ReachableHostSet> {
        let mut scans = self.scans.lock().await;
        if let Some(hosts) = scans.get(&subnet) {
            debug!(%subnet, "using cached reachability scan");
            return hosts.clone();
        }

        let hosts = Arc::new(prober.scan(subnet).await);
        scans.insert(subnet, hosts.clone());
        hosts
    }

    pub async fn get(&self, subnet: Subnet) -> Option<Arc<ReachableHostSet>> {
        self.scans.lock().await.get(&subnet).cloned()
    }

    /// Forgets `subnet`; the next lookup scans again.
    pub async fn invalidate(&self, subnet: Subnet) -> bool {
        self.scans.lock().await.remove(&subnet).is_some()
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
