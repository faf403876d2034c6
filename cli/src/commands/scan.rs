use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::*;
use doorlink_common::config::Config;
use doorlink_common::network::subnet::Subnet;
use doorlink_core::prober::{NetworkProbe, ReachabilityProber, ReachableHostSet};
use tracing::Instrument;

use crate::commands::target_subnet;
use crate::terminal::{colors, print, spinner};

pub async fn scan(network: Option<Subnet>, cfg: &Config, q_level: u8) -> anyhow::Result<()> {
    let subnet: Subnet = target_subnet(network.or(cfg.subnet))?;
    let span = spinner::start("scan", &format!("Probing {subnet}.1-254..."));

    let prober = ReachabilityProber::new(Arc::new(NetworkProbe::new(&cfg.probe)), &cfg.probe)
        .with_progress(Box::new(spinner::host_counter(span.clone())));

    let start_time: Instant = Instant::now();
    let hosts: ReachableHostSet = prober.scan(subnet).instrument(span).await;

    scan_ends(&hosts, start_time.elapsed(), q_level);
    Ok(())
}

fn scan_ends(hosts: &ReachableHostSet, total_time: Duration, q_level: u8) {
    if hosts.is_empty() {
        print::header("zero hosts answered", q_level);
        print::no_results("reachable hosts");
        return;
    }

    print::header(&format!("reachable hosts in {}", hosts.subnet()), q_level);
    for host in hosts.iter() {
        print_host(host, q_level);
    }
    print_summary(hosts.len(), total_time, q_level);
}

fn print_host(host: &Ipv4Addr, q_level: u8) {
    let addr: ColoredString = host.to_string().color(colors::IPV4_ADDR);
    match q_level {
        0 => print::bullet(addr),
        _ => print::print(&host.to_string()),
    }
}

fn print_summary(hosts_len: usize, total_time: Duration, q_level: u8) {
    if q_level > 0 {
        return;
    }

    let active_hosts: ColoredString = format!("{hosts_len} reachable hosts").bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: String = format!("Scan complete: {active_hosts} in {total_time}");

    print::summary(&output);
}
