//! Remote shell abstraction.
//!
//! Discovery and session management only talk to these traits; the SSH
//! implementation lives in [`ssh`].

use std::net::Ipv4Addr;

use async_trait::async_trait;
use doorlink_common::Result;
use doorlink_common::config::Credentials;

pub mod ssh;

/// Everything a remote command produced before its channel closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: Option<u32>,
}

/// An authenticated connection to one device.
#[async_trait]
pub trait ShellSession: Send + Sync {
    fn host(&self) -> Ipv4Addr;

    /// Runs `command` on a fresh channel and waits for that channel to close.
    async fn exec(&self, command: &str) -> Result<ExecOutput>;

    /// True once the transport is gone and the session can no longer be used.
    fn is_closed(&self) -> bool;

    async fn disconnect(&self) -> Result<()>;
}

/// Opens authenticated sessions.
///
/// Fails with [`doorlink_common::Error::AuthFailure`] when the host rejects
/// the credentials and with `Transport` for anything else.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn connect(&self, host: Ipv4Addr, credentials: &Credentials) -> Result<Box<dyn ShellSession>>;
}
