//! # Session Manager
//!
//! Owns at most one live shell session per role. Opening is idempotent,
//! closing is idempotent, and every state change is published on a
//! [`watch`] channel so a UI can follow it without polling.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use doorlink_common::config::{RemoteRole, ShellConfig};
use doorlink_common::{Error, Result};
use tokio::sync::{Mutex, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::executor::{CommandExecutor, CommandResult};
use crate::remote::{ShellConnector, ShellSession};

/// Sent before disconnecting so the remote shell flushes pending input.
pub const TEARDOWN_COMMAND: &str = "\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Connecting,
    Open,
}

type Slot = Option<Box<dyn ShellSession>>;

struct RoleEntry {
    session: Mutex<Slot>,
    state: watch::Sender<SessionState>,
}

impl RoleEntry {
    fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Closed);
        Self {
            session: Mutex::new(None),
            state,
        }
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }
}

pub struct SessionManager {
    connector: Arc<dyn ShellConnector>,
    executor: CommandExecutor,
    connect_timeout: Duration,
    teardown_timeout: Duration,
    roles: std::sync::Mutex<HashMap<String, Arc<RoleEntry>>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn ShellConnector>, cfg: &ShellConfig) -> Self {
        Self {
            connector,
            executor: CommandExecutor::new(cfg.command_timeout),
            connect_timeout: cfg.connect_timeout,
            teardown_timeout: cfg.teardown_timeout,
            roles: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, name: &str) -> Arc<RoleEntry> {
        let mut roles = self.roles.lock().unwrap_or_else(PoisonError::into_inner);
        roles
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RoleEntry::new()))
            .clone()
    }

    fn existing(&self, name: &str) -> Option<Arc<RoleEntry>> {
        self.roles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn state(&self, name: &str) -> SessionState {
        self.existing(name)
            .map(|entry| *entry.state.borrow())
            .unwrap_or(SessionState::Closed)
    }

    pub fn subscribe(&self, name: &str) -> watch::Receiver<SessionState> {
        self.entry(name).state.subscribe()
    }

    /// Names of roles whose session is currently open.
    pub fn open_roles(&self) -> Vec<String> {
        let roles = self.roles.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = roles
            .iter()
            .filter(|(_, entry)| *entry.state.borrow() == SessionState::Open)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Connects `role` unless it already has a live session.
    ///
    /// Connection failures are logged and leave the role `Closed`; an
    /// unresolved role stays `Closed` without any network traffic.
    pub async fn open(&self, role: &RemoteRole) -> SessionState {
        let entry = self.entry(&role.name);
        let mut slot = entry.session.lock().await;

        if let Some(session) = slot.as_ref() {
            if !session.is_closed() {
                debug!(role = %role.name, "session already open");
                return SessionState::Open;
            }
            debug!(role = %role.name, "discarding dropped session");
            *slot = None;
            entry.publish(SessionState::Closed);
        }

        self.connect(role, &entry, &mut slot).await
    }

    /// Closes and opens the session of `role` in one step.
    pub async fn reopen(&self, role: &RemoteRole) -> SessionState {
        let entry = self.entry(&role.name);
        let mut slot = entry.session.lock().await;

        self.teardown(&role.name, &mut slot).await;
        entry.publish(SessionState::Closed);
        self.connect(role, &entry, &mut slot).await
    }

    /// Closes the session of `name`. Does nothing when none is open.
    pub async fn close(&self, name: &str) {
        let Some(entry) = self.existing(name) else {
            return;
        };
        let mut slot = entry.session.lock().await;

        self.teardown(name, &mut slot).await;
        entry.publish(SessionState::Closed);
    }

    pub async fn close_all(&self) {
        let names: Vec<String> = {
            let roles = self.roles.lock().unwrap_or_else(PoisonError::into_inner);
            roles.keys().cloned().collect()
        };
        for name in names {
            self.close(&name).await;
        }
    }

    /// Runs `command` on the open session of `name`.
    ///
    /// Fails with [`Error::SessionUnavailable`] when the role has no live
    /// session; transport failures come back as a failed [`CommandResult`].
    pub async fn exec(&self, name: &str, command: &str) -> Result<CommandResult> {
        let unavailable = || Error::SessionUnavailable {
            role: name.to_string(),
        };

        let entry = self.existing(name).ok_or_else(unavailable)?;
        let mut slot = entry.session.lock().await;

        if slot.as_ref().is_some_and(|session| session.is_closed()) {
            debug!(role = name, "session dropped by the remote side");
            *slot = None;
            entry.publish(SessionState::Closed);
        }

        let session = slot.as_ref().ok_or_else(unavailable)?;
        Ok(self.executor.exec(command, session.as_ref()).await)
    }

    async fn connect(&self, role: &RemoteRole, entry: &RoleEntry, slot: &mut Slot) -> SessionState {
        let Some(host) = role.host else {
            debug!(role = %role.name, "no host resolved, not connecting");
            return SessionState::Closed;
        };

        entry.publish(SessionState::Connecting);
        let connected = timeout(
            self.connect_timeout,
            self.connector.connect(host, &role.credentials),
        )
        .await;

        match connected {
            Ok(Ok(session)) => {
                info!(role = %role.name, %host, "session opened");
                *slot = Some(session);
                entry.publish(SessionState::Open);
                SessionState::Open
            }
            Ok(Err(e)) => {
                warn!(role = %role.name, %host, "could not open session: {e}");
                entry.publish(SessionState::Closed);
                SessionState::Closed
            }
            Err(_) => {
                warn!(role = %role.name, %host, "session login timed out");
                entry.publish(SessionState::Closed);
                SessionState::Closed
            }
        }
    }

    async fn teardown(&self, name: &str, slot: &mut Slot) {
        let Some(session) = slot.take() else {
            return;
        };

        if !session.is_closed() {
            let flushed = self
                .executor
                .exec_with_timeout(TEARDOWN_COMMAND, session.as_ref(), self.teardown_timeout)
                .await;
            debug!(role = name, status = flushed.status, "teardown command sent");

            match timeout(self.teardown_timeout, session.disconnect()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(role = name, "disconnect failed: {e}"),
                Err(_) => warn!(role = name, "disconnect timed out, dropping the session"),
            }
        }
        info!(role = name, "session closed");
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
