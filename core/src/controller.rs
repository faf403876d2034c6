//! # Doorbell Controller
//!
//! Drives resolution, sessions and door actions from user requests and
//! app lifecycle events. All network work runs on a background worker; the
//! caller only sends requests and reads [`ControllerEvent`]s.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use doorlink_common::config::{ActionsConfig, Config, RemoteRole};
use doorlink_common::network::subnet::Subnet;
use doorlink_common::{Error, Result};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::actions::DoorAction;
use crate::cache::HostCache;
use crate::executor::CommandResult;
use crate::prober::{LivenessProbe, ReachabilityProber};
use crate::remote::ShellConnector;
use crate::resolver::HostResolver;
use crate::session::{SessionManager, SessionState};
use crate::validator::CredentialValidator;

const REQUEST_QUEUE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The app went to the background.
    Pause,
    /// The app came back to the foreground.
    Resume,
    /// The app is shutting down.
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerRequest {
    ResolveHosts,
    Perform(DoorAction),
    Exec { role: String, command: String },
    Lifecycle(LifecycleEvent),
}

#[derive(Debug)]
pub enum ControllerEvent {
    HostResolved { role: String, host: Ipv4Addr },
    /// No device accepted the role's credentials; features using it are off.
    FeatureUnavailable { role: String },
    ActionFinished { action: DoorAction, result: CommandResult },
    ActionFailed { action: DoorAction, error: Error },
    CommandFinished { role: String, result: CommandResult },
    CommandFailed { role: String, error: Error },
    Lifecycle(LifecycleEvent),
    Stopped,
}

pub struct DoorbellController {
    resolver: HostResolver,
    sessions: SessionManager,
    actions: ActionsConfig,
    roles: RwLock<Vec<RemoteRole>>,
    /// Set between `Pause` and `Resume`, and after `Destroy`.
    paused: AtomicBool,
}

impl DoorbellController {
    pub fn new(
        resolver: HostResolver,
        sessions: SessionManager,
        roles: Vec<RemoteRole>,
        actions: ActionsConfig,
    ) -> Self {
        Self {
            resolver,
            sessions,
            actions,
            roles: RwLock::new(roles),
            paused: AtomicBool::new(false),
        }
    }

    /// Wires the resolver and session manager from `config`.
    pub fn from_config(
        config: &Config,
        subnet: Subnet,
        probe: Arc<dyn LivenessProbe>,
        connector: Arc<dyn ShellConnector>,
        cache: Arc<HostCache>,
    ) -> Self {
        let resolver = HostResolver::new(
            subnet,
            ReachabilityProber::new(probe, &config.probe),
            CredentialValidator::new(connector.clone(), &config.shell),
            cache,
        );
        let sessions = SessionManager::new(connector, &config.shell);
        Self::new(resolver, sessions, config.roles.clone(), config.actions.clone())
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub async fn role(&self, name: &str) -> Option<RemoteRole> {
        self.roles.read().await.iter().find(|role| role.name == name).cloned()
    }

    pub async fn roles(&self) -> Vec<RemoteRole> {
        self.roles.read().await.clone()
    }

    /// Resolves every role that has no host yet and returns all roles.
    pub async fn resolve_roles(&self) -> Vec<RemoteRole> {
        let unresolved: Vec<RemoteRole> = self
            .roles
            .read()
            .await
            .iter()
            .filter(|role| role.is_unresolved())
            .cloned()
            .collect();

        for mut role in unresolved {
            self.resolver.resolve(&mut role).await;
            self.store(role).await;
        }
        self.roles().await
    }

    async fn store(&self, resolved: RemoteRole) {
        let mut roles = self.roles.write().await;
        if let Some(role) = roles.iter_mut().find(|role| role.name == resolved.name) {
            *role = resolved;
        }
    }

    async fn ensure_resolved(&self, name: &str) -> Result<RemoteRole> {
        let mut role = self
            .role(name)
            .await
            .ok_or_else(|| Error::InvalidRole(format!("unknown role '{name}'")))?;

        if role.is_unresolved() {
            self.resolver.resolve(&mut role).await;
            self.store(role.clone()).await;
        }
        if role.is_unresolved() {
            return Err(Error::NoHostFound { role: role.name });
        }
        Ok(role)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Runs `command` on the session of `role`, resolving and opening it
    /// first when needed.
    ///
    /// A session opened while the controller is paused is closed again
    /// right away and the command fails with [`Error::SessionUnavailable`].
    pub async fn exec(&self, role: &str, command: &str) -> Result<CommandResult> {
        let role = self.ensure_resolved(role).await?;
        self.sessions.open(&role).await;

        // Checked after `open` so a pause that raced the connect still wins.
        if self.is_paused() {
            debug!(role = %role.name, "paused while connecting, closing again");
            self.sessions.close(&role.name).await;
            return Err(Error::SessionUnavailable { role: role.name });
        }
        self.sessions.exec(&role.name, command).await
    }

    pub async fn perform(&self, action: DoorAction) -> Result<CommandResult> {
        let command = action.command(&self.actions);
        info!(%action, "performing door action");
        self.exec(action.role(&self.actions), &command).await
    }

    /// Pause and destroy close every session; resume reopens the sessions
    /// of resolved roles.
    ///
    /// Until the next resume, commands refuse to leave a session open.
    pub async fn handle_lifecycle(&self, event: LifecycleEvent) {
        debug!(?event, "lifecycle event");
        match event {
            LifecycleEvent::Pause | LifecycleEvent::Destroy => {
                self.paused.store(true, Ordering::SeqCst);
                self.sessions.close_all().await;
            }
            LifecycleEvent::Resume => {
                self.paused.store(false, Ordering::SeqCst);
                for role in self.roles().await.iter().filter(|role| !role.is_unresolved()) {
                    if self.sessions.reopen(role).await != SessionState::Open {
                        warn!(role = %role.name, "session did not come back after resume");
                    }
                }
            }
        }
    }

    /// Starts the background worker.
    ///
    /// The worker stops after a `Destroy` request or once every handle is
    /// dropped; commands already running are allowed to finish first.
    pub fn spawn(self: Arc<Self>) -> (ControllerHandle, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(self.run(request_rx, event_tx));
        (ControllerHandle { requests: request_tx }, event_rx)
    }

    async fn run(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<ControllerRequest>,
        events: mpsc::UnboundedSender<ControllerEvent>,
    ) {
        let mut in_flight = JoinSet::new();

        while let Some(request) = requests.recv().await {
            match request {
                ControllerRequest::Lifecycle(LifecycleEvent::Destroy) => break,
                ControllerRequest::Lifecycle(event) => {
                    self.handle_lifecycle(event).await;
                    let _ = events.send(ControllerEvent::Lifecycle(event));
                }
                request => {
                    let controller = self.clone();
                    let events = events.clone();
                    in_flight.spawn(async move { controller.serve(request, &events).await });
                }
            }
            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        self.handle_lifecycle(LifecycleEvent::Destroy).await;
        let _ = events.send(ControllerEvent::Lifecycle(LifecycleEvent::Destroy));
        let _ = events.send(ControllerEvent::Stopped);
        info!("controller stopped");
    }

    async fn serve(&self, request: ControllerRequest, events: &mpsc::UnboundedSender<ControllerEvent>) {
        match request {
            ControllerRequest::ResolveHosts => {
                for role in self.resolve_roles().await {
                    let event = match role.host {
                        Some(host) => ControllerEvent::HostResolved { role: role.name, host },
                        None => ControllerEvent::FeatureUnavailable { role: role.name },
                    };
                    let _ = events.send(event);
                }
            }
            ControllerRequest::Perform(action) => {
                let event = match self.perform(action).await {
                    Ok(result) => ControllerEvent::ActionFinished { action, result },
                    Err(error) => ControllerEvent::ActionFailed { action, error },
                };
                let _ = events.send(event);
            }
            ControllerRequest::Exec { role, command } => {
                let event = match self.exec(&role, &command).await {
                    Ok(result) => ControllerEvent::CommandFinished { role, result },
                    Err(error) => ControllerEvent::CommandFailed { role, error },
                };
                let _ = events.send(event);
            }
            ControllerRequest::Lifecycle(event) => self.handle_lifecycle(event).await,
        }
    }
}

/// Cloneable sender side of a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    requests: mpsc::Sender<ControllerRequest>,
}

impl ControllerHandle {
    pub async fn send(&self, request: ControllerRequest) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| Error::ControllerStopped)
    }

    pub async fn resolve_hosts(&self) -> Result<()> {
        self.send(ControllerRequest::ResolveHosts).await
    }

    pub async fn perform(&self, action: DoorAction) -> Result<()> {
        self.send(ControllerRequest::Perform(action)).await
    }

    pub async fn exec(&self, role: impl Into<String>, command: impl Into<String>) -> Result<()> {
        self.send(ControllerRequest::Exec {
            role: role.into(),
            command: command.into(),
        })
        .await
    }

    pub async fn lifecycle(&self, event: LifecycleEvent) -> Result<()> {
        self.send(ControllerRequest::Lifecycle(event)).await
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
    use crate::executor::STATUS_OK;
    use crate::remote::{ExecOutput, ShellSession};
    use async_trait::async_trait;
    use doorlink_common::config::{Credentials, FEED_ROLE, MAIN_ROLE};

    const FEED_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 18);

    struct FeedOnlyNetwork;

    #[async_trait]
    impl LivenessProbe for FeedOnlyNetwork {
        async fn is_alive(&self, addr: Ipv4Addr) -> bool {
            addr == FEED_HOST
        }
    }

    struct Session;

    #[async_trait]
    impl ShellSession for Session {
        fn host(&self) -> Ipv4Addr {
            FEED_HOST
        }
        async fn exec(&self, command: &str) -> Result<ExecOutput> {
            Ok(ExecOutput {
                stdout: command.trim().to_string(),
                stderr: String::new(),
                exit_status: Some(0),
            })
        }
        fn is_closed(&self) -> bool {
            false
        }
        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }
    }

    struct PiConnector;

    #[async_trait]
    impl ShellConnector for PiConnector {
        async fn connect(&self, host: Ipv4Addr, credentials: &Credentials) -> Result<Box<dyn ShellSession>> {
            if host == FEED_HOST && credentials.username == "pi" {
                Ok(Box::new(Session))
            } else {
                Err(Error::AuthFailure { host })
            }
        }
    }

    fn controller() -> DoorbellController {
        DoorbellController::from_config(
            &Config::default(),
            Subnet::new(192, 168, 0),
            Arc::new(FeedOnlyNetwork),
            Arc::new(PiConnector),
            Arc::new(HostCache::new()),
        )
    }

    #[tokio::test]
    async fn resolve_roles_marks_missing_device_unresolved() {
        let controller = controller();
        let roles = controller.resolve_roles().await;

        let feed = roles.iter().find(|r| r.name == FEED_ROLE).unwrap();
        let main = roles.iter().find(|r| r.name == MAIN_ROLE).unwrap();
        assert_eq!(feed.host, Some(FEED_HOST));
        assert!(main.is_unresolved());
    }

    #[tokio::test]
    async fn start_feed_runs_on_the_feed_session() {
        let controller = controller();
        let result = controller.perform(DoorAction::StartFeed).await.unwrap();

        assert_eq!(result.status, STATUS_OK);
        assert!(result.output.ends_with("./startServer.sh"));
        assert_eq!(controller.sessions().state(FEED_ROLE), SessionState::Open);
    }

    #[tokio::test]
    async fn door_action_without_main_device_reports_no_host() {
        let err = controller().perform(DoorAction::OpenDoor).await.unwrap_err();
        assert!(matches!(err, Error::NoHostFound { ref role } if role == MAIN_ROLE));
    }

    #[tokio::test]
    async fn pause_closes_and_resume_reopens() {
        let controller = controller();
        controller.resolve_roles().await;
        controller.perform(DoorAction::StartFeed).await.unwrap();

        controller.handle_lifecycle(LifecycleEvent::Pause).await;
        assert_eq!(controller.sessions().state(FEED_ROLE), SessionState::Closed);

        controller.handle_lifecycle(LifecycleEvent::Resume).await;
        assert_eq!(controller.sessions().state(FEED_ROLE), SessionState::Open);
        assert_eq!(controller.sessions().state(MAIN_ROLE), SessionState::Closed);
    }

    #[tokio::test]
    async fn actions_while_paused_leave_no_session_open() {
        let controller = controller();
        controller.handle_lifecycle(LifecycleEvent::Pause).await;

        let err = controller.perform(DoorAction::StartFeed).await.unwrap_err();
        assert!(matches!(err, Error::SessionUnavailable { ref role } if role == FEED_ROLE));
        assert_eq!(controller.sessions().state(FEED_ROLE), SessionState::Closed);

        controller.handle_lifecycle(LifecycleEvent::Resume).await;
        assert!(!controller.is_paused());
        assert!(controller.perform(DoorAction::StartFeed).await.is_ok());
    }

    #[tokio::test]
    async fn worker_reports_events_and_stops_on_destroy() {
        let (handle, mut events) = Arc::new(controller()).spawn();

        handle.resolve_hosts().await.unwrap();
        let mut resolved = Vec::new();
        while resolved.len() < 2 {
            match events.recv().await.unwrap() {
                ControllerEvent::HostResolved { role, host } => resolved.push((role, Some(host))),
                ControllerEvent::FeatureUnavailable { role } => resolved.push((role, None)),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        resolved.sort();
        assert_eq!(
            resolved,
            vec![(FEED_ROLE.to_string(), Some(FEED_HOST)), (MAIN_ROLE.to_string(), None)]
        );

        handle.perform(DoorAction::StartFeed).await.unwrap();
        match events.recv().await.unwrap() {
            ControllerEvent::ActionFinished { action, result } => {
                assert_eq!(action, DoorAction::StartFeed);
                assert!(result.is_success());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        handle.lifecycle(LifecycleEvent::Destroy).await.unwrap();
        let mut saw_stopped = false;
        while let Some(event) = events.recv().await {
            if matches!(event, ControllerEvent::Stopped) {
                saw_stopped = true;
            }
        }
        assert!(saw_stopped);
        assert!(handle.perform(DoorAction::OpenDoor).await.is_err());
    }
}
