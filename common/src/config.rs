use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::network::subnet::Subnet;

pub const MAIN_ROLE: &str = "main";
pub const FEED_ROLE: &str = "feed";

/// Login for one remote endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keeps passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A named remote endpoint on the device (e.g. the door controller or the
/// video relay) together with its login and, once resolved, its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRole {
    pub name: String,
    pub credentials: Credentials,
    pub host: Option<Ipv4Addr>,
}

impl RemoteRole {
    pub fn new(name: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            name: name.into(),
            credentials,
            host: None,
        }
    }

    pub fn with_host(mut self, host: Ipv4Addr) -> Self {
        self.host = Some(host);
        self
    }

    /// True while the resolver has not found an address for this role.
    pub fn is_unresolved(&self) -> bool {
        self.host.is_none()
    }
}

impl FromStr for RemoteRole {
    type Err = Error;

    /// Parses `NAME=USER:PASS` or `NAME=USER:PASS@HOST`.
    ///
    /// The password may contain ':'; the host is split off the last '@'.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((name, rest)) = s.split_once('=') else {
            return Err(Error::InvalidRole(format!("'{s}' is missing '='")));
        };

        let (login, host) = match rest.rsplit_once('@') {
            Some((login, host_str)) => {
                let host = host_str
                    .parse::<Ipv4Addr>()
                    .map_err(|e| Error::InvalidRole(format!("invalid host '{host_str}': {e}")))?;
                (login, Some(host))
            }
            None => (rest, None),
        };

        let Some((username, password)) = login.split_once(':') else {
            return Err(Error::InvalidRole(format!("'{s}' is missing 'USER:PASS'")));
        };

        if name.is_empty() || username.is_empty() {
            return Err(Error::InvalidRole(format!(
                "'{s}' needs a role name and a username"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            credentials: Credentials::new(username, password),
            host,
        })
    }
}

/// Reachability scan tuning.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub max_concurrent: usize,
    /// TCP port tried when ICMP gets no answer.
    pub tcp_port: u16,
    /// Try ICMP echo when raw sockets are available.
    pub use_icmp: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(300),
            max_concurrent: 128,
            tcp_port: 80,
            use_icmp: true,
        }
    }
}

/// Remote shell login and execution tuning.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub port: u16,
    /// Upper bound for a credential check against one candidate.
    pub login_timeout: Duration,
    /// Upper bound for opening the long-lived session.
    pub connect_timeout: Duration,
    pub max_concurrent_logins: usize,
    /// Upper bound for a single command, channel closure included.
    pub command_timeout: Duration,
    /// Upper bound for the no-op command sent before disconnecting.
    pub teardown_timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            port: 22,
            login_timeout: Duration::from_millis(1_500),
            connect_timeout: Duration::from_secs(10),
            max_concurrent_logins: 32,
            command_timeout: Duration::from_secs(30),
            teardown_timeout: Duration::from_secs(2),
        }
    }
}

/// Where a door action's script lives on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptConfig {
    pub role: String,
    pub directory: String,
    pub script: String,
}

impl ScriptConfig {
    pub fn new(role: &str, directory: &str, script: &str) -> Self {
        Self {
            role: role.to_string(),
            directory: directory.to_string(),
            script: script.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionsConfig {
    pub open_door: ScriptConfig,
    pub close_door: ScriptConfig,
    pub start_feed: ScriptConfig,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        const DOOR_DIR: &str = "Test_facial_rec/phone_commands";
        const FEED_DIR: &str = "cm2211-project-group-8/edge_device/Live Feed";

        Self {
            open_door: ScriptConfig::new(MAIN_ROLE, DOOR_DIR, "open.sh"),
            close_door: ScriptConfig::new(MAIN_ROLE, DOOR_DIR, "close.sh"),
            start_feed: ScriptConfig::new(FEED_ROLE, FEED_DIR, "startServer.sh"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Network to scan. Detected from the LAN interface when unset.
    pub subnet: Option<Subnet>,
    pub roles: Vec<RemoteRole>,
    pub probe: ProbeConfig,
    pub shell: ShellConfig,
    pub actions: ActionsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subnet: None,
            roles: vec![
                RemoteRole::new(MAIN_ROLE, Credentials::new("admin", "admin")),
                RemoteRole::new(FEED_ROLE, Credentials::new("pi", "raspberry")),
            ],
            probe: ProbeConfig::default(),
            shell: ShellConfig::default(),
            actions: ActionsConfig::default(),
        }
    }
}

impl Config {
    pub fn role(&self, name: &str) -> Option<&RemoteRole> {
        self.roles.iter().find(|role| role.name == name)
    }

    /// Adds a role or replaces the one with the same name.
    pub fn upsert_role(&mut self, role: RemoteRole) {
        match self.roles.iter_mut().find(|existing| existing.name == role.name) {
            Some(existing) => *existing = role,
            None => self.roles.push(role),
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing() {
        let role = RemoteRole::from_str("feed=pi:raspberry").unwrap();
        assert_eq!(role.name, "feed");
        assert_eq!(role.credentials, Credentials::new("pi", "raspberry"));
        assert!(role.is_unresolved());

        let role = RemoteRole::from_str("main=admin:se:cret@192.168.0.18").unwrap();
        assert_eq!(role.credentials.password, "se:cret");
        assert_eq!(role.host, Some(Ipv4Addr::new(192, 168, 0, 18)));

        assert!(RemoteRole::from_str("feed").is_err());
        assert!(RemoteRole::from_str("feed=pi").is_err());
        assert!(RemoteRole::from_str("=pi:raspberry").is_err());
        assert!(RemoteRole::from_str("feed=pi:raspberry@nowhere").is_err());
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("pi", "raspberry"));
        assert!(debug.contains("pi"));
        assert!(!debug.contains("raspberry"));
    }

    #[test]
    fn upsert_replaces_existing_role() {
        let mut cfg = Config::default();
        let replacement = RemoteRole::new(MAIN_ROLE, Credentials::new("root", "toor"));
        cfg.upsert_role(replacement.clone());

        assert_eq!(cfg.roles.len(), 2);
        assert_eq!(cfg.role(MAIN_ROLE), Some(&replacement));

        cfg.upsert_role(RemoteRole::new("garage", Credentials::new("a", "b")));
        assert_eq!(cfg.roles.len(), 3);
    }

    #[test]
    fn defaults_match_device_layout() {
        let cfg = Config::default();
        assert_eq!(cfg.probe.timeout, Duration::from_millis(300));
        assert_eq!(cfg.probe.max_concurrent, 128);
        assert_eq!(cfg.shell.max_concurrent_logins, 32);
        assert_eq!(cfg.actions.start_feed.role, FEED_ROLE);
        assert_eq!(cfg.actions.open_door.script, "open.sh");
    }
}
