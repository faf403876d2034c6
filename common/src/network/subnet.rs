//! # Subnet Model
//!
//! A `/24` IPv4 network identified by its three leading octets.
//!
//! Accepted textual forms:
//! * `192.168.0` (prefix only)
//! * `192.168.0.42` (any address inside the network)
//! * `192.168.0.0/24` (CIDR, the prefix must be 24)

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::Error;

/// First and last usable host suffix of a `/24`.
const FIRST_HOST: u8 = 1;
const LAST_HOST: u8 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subnet {
    prefix: [u8; 3],
}

impl Subnet {
    pub fn new(a: u8, b: u8, c: u8) -> Self {
        Self { prefix: [a, b, c] }
    }

    /// The subnet a local address lives in.
    pub fn from_addr(addr: Ipv4Addr) -> Self {
        let [a, b, c, _] = addr.octets();
        Self::new(a, b, c)
    }

    pub fn host(&self, suffix: u8) -> Ipv4Addr {
        let [a, b, c] = self.prefix;
        Ipv4Addr::new(a, b, c, suffix)
    }

    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        Self::from_addr(*addr) == *self
    }

    /// Every usable host address, `.1` through `.254`.
    pub fn hosts(&self) -> impl Iterator<Item = Ipv4Addr> + use<> {
        let subnet = *self;
        (FIRST_HOST..=LAST_HOST).map(move |suffix| subnet.host(suffix))
    }

    pub fn len(&self) -> usize {
        usize::from(LAST_HOST - FIRST_HOST) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.prefix;
        write!(f, "{a}.{b}.{c}")
    }
}

impl From<Ipv4Addr> for Subnet {
    fn from(addr: Ipv4Addr) -> Self {
        Self::from_addr(addr)
    }
}

impl FromStr for Subnet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Some((ip_str, prefix_str)) = s.split_once('/') {
            return parse_cidr(ip_str, prefix_str);
        }

        if let Ok(addr) = s.parse::<Ipv4Addr>() {
            return Ok(Self::from_addr(addr));
        }

        parse_prefix(s)
    }
}

/// Parses the three-octet form, e.g. "10.0.3".
fn parse_prefix(s: &str) -> Result<Subnet, Error> {
    let octets: Vec<u8> = s
        .split('.')
        .map(|octet| octet.parse::<u8>())
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|e| Error::InvalidSubnet(format!("'{s}': {e}")))?;

    match octets.as_slice() {
        [a, b, c] => Ok(Subnet::new(*a, *b, *c)),
        _ => Err(Error::InvalidSubnet(format!(
            "'{s}' must have exactly three octets"
        ))),
    }
}

fn parse_cidr(ip_str: &str, prefix_str: &str) -> Result<Subnet, Error> {
    let addr = ip_str
        .parse::<Ipv4Addr>()
        .map_err(|e| Error::InvalidSubnet(format!("invalid IP in CIDR '{ip_str}': {e}")))?;

    let prefix = prefix_str
        .parse::<u8>()
        .map_err(|e| Error::InvalidSubnet(format!("invalid prefix '{prefix_str}': {e}")))?;

    if prefix != 24 {
        return Err(Error::InvalidSubnet(format!(
            "only /24 networks can be scanned, got /{prefix}"
        )));
    }

    Ok(Subnet::from_addr(addr))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
