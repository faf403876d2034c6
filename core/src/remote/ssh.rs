use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use doorlink_common::config::Credentials;
use doorlink_common::{Error, Result};
use russh::keys::PublicKey;
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ExecOutput, ShellConnector, ShellSession};

/// Accepts every host key.
///
/// The devices are headless boards that regenerate keys on reflash and are
/// found by scanning, so there is no known_hosts entry to pin against. This
/// leaves the login open to a man in the middle on the local network.
struct TrustedDevice;

impl client::Handler for TrustedDevice {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Opens password-authenticated SSH sessions.
pub struct SshConnector {
    port: u16,
    config: Arc<client::Config>,
}

impl SshConnector {
    pub fn new(port: u16) -> Self {
        let config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });
        Self { port, config }
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn connect(&self, host: Ipv4Addr, credentials: &Credentials) -> Result<Box<dyn ShellSession>> {
        let addr = SocketAddr::new(IpAddr::V4(host), self.port);

        let mut handle = client::connect(self.config.clone(), addr, TrustedDevice)
            .await
            .map_err(|e| Error::Transport(format!("SSH connect to {addr} failed: {e}")))?;

        let auth = handle
            .authenticate_password(&credentials.username, &credentials.password)
            .await
            .map_err(|e| Error::Transport(format!("password auth on {addr} failed: {e}")))?;

        if !auth.success() {
            let _ = handle.disconnect(Disconnect::ByApplication, "", "en").await;
            return Err(Error::AuthFailure { host });
        }

        debug!(%host, user = %credentials.username, "SSH session established");
        Ok(Box::new(SshSession {
            host,
            handle: Mutex::new(handle),
        }))
    }
}

pub struct SshSession {
    host: Ipv4Addr,
    handle: Mutex<client::Handle<TrustedDevice>>,
}

#[async_trait]
impl ShellSession for SshSession {
    fn host(&self) -> Ipv4Addr {
        self.host
    }

    async fn exec(&self, command: &str) -> Result<ExecOutput> {
        let mut channel = self
            .handle
            .lock()
            .await
            .channel_open_session()
            .await
            .map_err(|e| Error::Transport(format!("failed to open SSH channel: {e}")))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::Transport(format!("failed to exec command: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        // ExitStatus may arrive after Eof, so only Close ends the loop.
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext } if ext == 1 => {
                    stderr.extend_from_slice(&data);
                }
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        let output = ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        };

        debug!(
            host = %self.host,
            exit_status,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "SSH command completed"
        );
        Ok(output)
    }

    fn is_closed(&self) -> bool {
        // A session busy with a command is still open.
        self.handle
            .try_lock()
            .map(|handle| handle.is_closed())
            .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        self.handle
            .lock()
            .await
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| Error::Transport(format!("SSH disconnect failed: {e}")))?;
        info!(host = %self.host, "SSH session disconnected");
        Ok(())
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
