use std::net::Ipv4Addr;
use std::sync::Arc;

use doorlink_common::config::ProbeConfig;
use doorlink_common::network::subnet::Subnet;
use doorlink_core::prober::{LivenessProbe, NetworkProbe, ReachabilityProber};

fn tcp_only() -> ProbeConfig {
    ProbeConfig {
        use_icmp: false,
        ..ProbeConfig::default()
    }
}

/// Loopback answers a TCP handshake on port 80 with either an accept or a
/// reset, so it always counts as alive.
#[tokio::test]
async fn tcp_probe_finds_localhost() {
    let probe = NetworkProbe::tcp_only(&tcp_only());
    assert!(!probe.uses_icmp());
    assert!(probe.is_alive(Ipv4Addr::LOCALHOST).await);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn scan_of_loopback_subnet_includes_localhost() {
    let cfg = tcp_only();
    let prober = ReachabilityProber::new(Arc::new(NetworkProbe::new(&cfg)), &cfg);

    let hosts = prober.scan(Subnet::new(127, 0, 0)).await;
    assert!(hosts.contains(&Ipv4Addr::LOCALHOST));
}

#[tokio::test]
#[ignore]
async fn icmp_probe_finds_localhost() {
    let probe = NetworkProbe::new(&ProbeConfig::default());
    assert!(probe.uses_icmp(), "needs root for raw sockets");
    assert!(probe.is_alive(Ipv4Addr::LOCALHOST).await);
}
