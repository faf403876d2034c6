//! In-memory stand-ins for the network: a LAN that answers probes from a
//! fixed set of addresses and SSH devices that accept fixed logins.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use doorlink_common::config::Credentials;
use doorlink_common::{Error, Result};
use doorlink_core::prober::LivenessProbe;
use doorlink_core::remote::{ExecOutput, ShellConnector, ShellSession};

pub fn home(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 0, last)
}

/// Answers for `alive` addresses; every other address stays silent far
/// longer than any probe timeout.
pub struct FakeLan {
    alive: HashSet<Ipv4Addr>,
    probes: AtomicUsize,
}

impl FakeLan {
    pub fn new(alive: &[Ipv4Addr]) -> Self {
        Self {
            alive: alive.iter().copied().collect(),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessProbe for FakeLan {
    async fn is_alive(&self, addr: Ipv4Addr) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.alive.contains(&addr) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            true
        } else {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            false
        }
    }
}

#[derive(Default)]
pub struct DeviceLog {
    pub connects: AtomicUsize,
    pub live_sessions: AtomicUsize,
    pub commands: Mutex<Vec<String>>,
}

impl DeviceLog {
    pub fn live(&self) -> usize {
        self.live_sessions.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

/// SSH devices keyed by address. Logins to unknown addresses are refused.
pub struct FakeDevices {
    accounts: HashMap<Ipv4Addr, Credentials>,
    hang_commands: bool,
    pub log: Arc<DeviceLog>,
}

impl FakeDevices {
    pub fn new(accounts: &[(Ipv4Addr, Credentials)]) -> Self {
        Self {
            accounts: accounts.iter().cloned().collect(),
            hang_commands: false,
            log: Arc::new(DeviceLog::default()),
        }
    }

    /// Every command run on these devices never finishes.
    pub fn hanging(mut self) -> Self {
        self.hang_commands = true;
        self
    }
}

#[async_trait]
impl ShellConnector for FakeDevices {
    async fn connect(&self, host: Ipv4Addr, credentials: &Credentials) -> Result<Box<dyn ShellSession>> {
        self.log.connects.fetch_add(1, Ordering::SeqCst);
        match self.accounts.get(&host) {
            Some(account) if account == credentials => {
                self.log.live_sessions.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(FakeSession {
                    host,
                    closed: AtomicBool::new(false),
                    hang: self.hang_commands,
                    log: self.log.clone(),
                }))
            }
            Some(_) => Err(Error::AuthFailure { host }),
            None => Err(Error::Transport(format!("{host}:22 refused the connection"))),
        }
    }
}

pub struct FakeSession {
    host: Ipv4Addr,
    closed: AtomicBool,
    hang: bool,
    log: Arc<DeviceLog>,
}

#[async_trait]
impl ShellSession for FakeSession {
    fn host(&self) -> Ipv4Addr {
        self.host
    }

    async fn exec(&self, command: &str) -> Result<ExecOutput> {
        self.log.commands.lock().unwrap().push(command.to_string());
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(ExecOutput {
            stdout: format!("ran on {}", self.host),
            stderr: String::new(),
            exit_status: Some(0),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.log.live_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
