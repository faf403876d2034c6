//! # Credential Validator
//!
//! Tries a role's login against every reachable host at once and reports
//! the first host that accepts it.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use doorlink_common::config::{Credentials, ShellConfig};
use doorlink_common::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::remote::ShellConnector;

pub struct CredentialValidator {
    connector: Arc<dyn ShellConnector>,
    login_timeout: Duration,
    teardown_timeout: Duration,
    max_concurrent: usize,
}

impl CredentialValidator {
    pub fn new(connector: Arc<dyn ShellConnector>, cfg: &ShellConfig) -> Self {
        Self {
            connector,
            login_timeout: cfg.login_timeout,
            teardown_timeout: cfg.teardown_timeout,
            max_concurrent: cfg.max_concurrent_logins.max(1),
        }
    }

    /// Returns the host that accepted `credentials` first, if any.
    ///
    /// Attempts still running when a winner is found are cancelled, and the
    /// session opened for the check is disconnected again.
    pub async fn find_host(
        &self,
        candidates: impl IntoIterator<Item = Ipv4Addr>,
        credentials: &Credentials,
    ) -> Option<Ipv4Addr> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut attempts: JoinSet<Option<Ipv4Addr>> = JoinSet::new();

        for host in candidates {
            let connector = self.connector.clone();
            let semaphore = semaphore.clone();
            let credentials = credentials.clone();
            let login_timeout = self.login_timeout;
            let teardown_timeout = self.teardown_timeout;

            attempts.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                let session = match timeout(login_timeout, connector.connect(host, &credentials)).await {
                    Ok(Ok(session)) => session,
                    Ok(Err(Error::AuthFailure { .. })) => {
                        trace!(%host, "credentials rejected");
                        return None;
                    }
                    Ok(Err(e)) => {
                        trace!(%host, "login attempt failed: {e}");
                        return None;
                    }
                    Err(_) => {
                        trace!(%host, "login attempt timed out");
                        return None;
                    }
                };

                match timeout(teardown_timeout, session.disconnect()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => debug!(%host, "failed to close validation session: {e}"),
                    Err(_) => debug!(%host, "validation session did not close in time"),
                }
                Some(host)
            });
        }

        let mut winner = None;
        while let Some(joined) = attempts.join_next().await {
            if let Ok(Some(host)) = joined {
                winner = Some(host);
                break;
            }
        }
        attempts.abort_all();

        match winner {
            Some(host) => debug!(%host, user = %credentials.username, "credentials accepted"),
            None => debug!(user = %credentials.username, "no candidate accepted the credentials"),
        }
        winner
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
