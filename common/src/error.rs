use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A liveness probe got no answer in time. Scans log it and move on.
    #[error("probe timed out")]
    ProbeTimeout,

    /// The remote shell rejected the credentials.
    #[error("authentication rejected by {host}")]
    AuthFailure { host: Ipv4Addr },

    /// Resolution exhausted every candidate for a role.
    #[error("no host on the network accepted the credentials for role '{role}'")]
    NoHostFound { role: String },

    /// A command was requested while the role had no open session.
    #[error("no open session for role '{role}', try again")]
    SessionUnavailable { role: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("command did not finish within {0:?}")]
    CommandTimeout(Duration),

    #[error("invalid subnet: {0}")]
    InvalidSubnet(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("no interface available for LAN discovery")]
    NoLanInterface,

    #[error("controller has stopped")]
    ControllerStopped,
}
