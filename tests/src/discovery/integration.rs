use std::sync::Arc;
use std::time::Duration;

use doorlink_common::config::{Config, Credentials, RemoteRole, FEED_ROLE, MAIN_ROLE};
use doorlink_common::network::subnet::Subnet;
use doorlink_core::cache::HostCache;
use doorlink_core::prober::ReachabilityProber;
use doorlink_core::resolver::HostResolver;
use doorlink_core::validator::CredentialValidator;
use tokio::time::Instant;

use crate::fakes::{home, FakeDevices, FakeLan};

fn home_subnet() -> Subnet {
    Subnet::new(192, 168, 0)
}

/// `.5` is the door controller, `.18` the camera board.
fn home_network() -> (Arc<FakeLan>, Arc<FakeDevices>) {
    let lan = Arc::new(FakeLan::new(&[home(5), home(18)]));
    let devices = Arc::new(FakeDevices::new(&[
        (home(5), Credentials::new("admin", "admin")),
        (home(18), Credentials::new("pi", "raspberry")),
    ]));
    (lan, devices)
}

fn resolver(lan: Arc<FakeLan>, devices: Arc<FakeDevices>) -> HostResolver {
    let cfg = Config::default();
    HostResolver::new(
        home_subnet(),
        ReachabilityProber::new(lan, &cfg.probe),
        CredentialValidator::new(devices, &cfg.shell),
        Arc::new(HostCache::new()),
    )
}

fn default_role(name: &str) -> RemoteRole {
    Config::default().role(name).cloned().unwrap()
}

#[tokio::test(start_paused = true)]
async fn scan_with_two_responders_is_bounded() {
    let (lan, _) = home_network();
    let prober = ReachabilityProber::new(lan.clone(), &Config::default().probe);

    let started = Instant::now();
    let hosts = prober.scan(home_subnet()).await;

    assert_eq!(hosts.iter().copied().collect::<Vec<_>>(), vec![home(5), home(18)]);
    assert_eq!(lan.probes(), 254);
    assert!(
        started.elapsed() <= Duration::from_millis(700),
        "scan took {:?}",
        started.elapsed()
    );
}

#[tokio::test(start_paused = true)]
async fn feed_resolves_to_camera_board() {
    let (lan, devices) = home_network();
    let resolver = resolver(lan, devices);

    let feed = default_role(FEED_ROLE);
    assert_eq!(resolver.resolve_host(&feed).await, Some(home(18)));

    let main = default_role(MAIN_ROLE);
    assert_eq!(resolver.resolve_host(&main).await, Some(home(5)));
}

#[tokio::test(start_paused = true)]
async fn wrong_password_resolves_to_nothing() {
    let (lan, devices) = home_network();
    let resolver = resolver(lan, devices);

    let mut feed = RemoteRole::new(FEED_ROLE, Credentials::new("pi", "wrong"));
    assert_eq!(resolver.resolve(&mut feed).await, None);
    assert!(feed.is_unresolved());
}

#[tokio::test(start_paused = true)]
async fn resolution_is_repeatable_and_scans_once() {
    let (lan, devices) = home_network();
    let resolver = resolver(lan.clone(), devices.clone());
    let feed = default_role(FEED_ROLE);

    let first = resolver.resolve_host(&feed).await;
    let second = resolver.resolve_host(&feed).await;

    assert_eq!(first, second);
    assert_eq!(lan.probes(), 254);
    // Validation sessions are closed again.
    assert_eq!(devices.log.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_network_resolves_to_nothing() {
    let lan = Arc::new(FakeLan::new(&[]));
    let devices = Arc::new(FakeDevices::new(&[]));
    let resolver = resolver(lan, devices.clone());

    assert_eq!(resolver.resolve_host(&default_role(FEED_ROLE)).await, None);
    assert_eq!(devices.log.connects(), 0);
}
