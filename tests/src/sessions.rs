use std::sync::Arc;
use std::time::Duration;

use doorlink_common::config::{Config, Credentials, RemoteRole, FEED_ROLE, MAIN_ROLE};
use doorlink_common::network::subnet::Subnet;
use doorlink_common::Error;
use doorlink_core::actions::DoorAction;
use doorlink_core::cache::HostCache;
use doorlink_core::controller::{ControllerEvent, DoorbellController, LifecycleEvent};
use doorlink_core::executor::{STATUS_FAILED, STATUS_OK};
use doorlink_core::session::{SessionManager, SessionState, TEARDOWN_COMMAND};

use crate::fakes::{home, FakeDevices, FakeLan};

fn camera_board() -> RemoteRole {
    RemoteRole::new(FEED_ROLE, Credentials::new("pi", "raspberry")).with_host(home(18))
}

fn sessions(devices: Arc<FakeDevices>) -> SessionManager {
    SessionManager::new(devices, &Config::default().shell)
}

fn board_devices() -> Arc<FakeDevices> {
    Arc::new(FakeDevices::new(&[(home(18), Credentials::new("pi", "raspberry"))]))
}

#[tokio::test]
async fn opening_twice_leaves_one_live_session() {
    let devices = board_devices();
    let sessions = sessions(devices.clone());

    assert_eq!(sessions.open(&camera_board()).await, SessionState::Open);
    assert_eq!(sessions.open(&camera_board()).await, SessionState::Open);

    assert_eq!(devices.log.live(), 1);
    assert_eq!(devices.log.connects(), 1);
}

#[tokio::test]
async fn closing_a_closed_role_is_a_no_op() {
    let devices = board_devices();
    let sessions = sessions(devices.clone());

    sessions.close(FEED_ROLE).await;
    sessions.open(&camera_board()).await;
    sessions.close(FEED_ROLE).await;
    sessions.close(FEED_ROLE).await;

    assert_eq!(devices.log.live(), 0);
    assert_eq!(devices.log.commands(), vec![TEARDOWN_COMMAND.to_string()]);
}

#[tokio::test]
async fn exec_without_session_fails_fast() {
    let sessions = sessions(board_devices());

    let outcome = tokio::time::timeout(Duration::from_millis(100), sessions.exec(FEED_ROLE, "ls"))
        .await
        .expect("exec on a closed role must not block");

    assert!(matches!(outcome, Err(Error::SessionUnavailable { .. })));
}

#[tokio::test]
async fn open_door_script_reports_200() {
    let devices = Arc::new(FakeDevices::new(&[(home(5), Credentials::new("admin", "admin"))]));
    let sessions = sessions(devices.clone());
    let main = RemoteRole::new(MAIN_ROLE, Credentials::new("admin", "admin")).with_host(home(5));
    sessions.open(&main).await;

    let command = DoorAction::OpenDoor.command(&Config::default().actions);
    let result = sessions.exec(MAIN_ROLE, &command).await.unwrap();

    assert_eq!(result.status, STATUS_OK);
    assert_eq!(result.exit_status, Some(0));
    assert_eq!(devices.log.commands(), vec![command]);
}

#[tokio::test(start_paused = true)]
async fn hanging_command_times_out_with_minus_one() {
    let devices = Arc::new(FakeDevices::new(&[(home(18), Credentials::new("pi", "raspberry"))]).hanging());
    let sessions = sessions(devices.clone());
    sessions.open(&camera_board()).await;

    let result = sessions.exec(FEED_ROLE, "./startServer.sh").await.unwrap();
    assert_eq!(result.status, STATUS_FAILED);

    // Teardown is bounded too, so closing still completes.
    sessions.close(FEED_ROLE).await;
    assert_eq!(devices.log.live(), 0);
}

fn home_controller() -> (DoorbellController, Arc<FakeDevices>) {
    let lan = Arc::new(FakeLan::new(&[home(18)]));
    let devices = board_devices();
    let controller = DoorbellController::from_config(
        &Config::default(),
        Subnet::new(192, 168, 0),
        lan,
        devices.clone(),
        Arc::new(HostCache::new()),
    );
    (controller, devices)
}

#[tokio::test(start_paused = true)]
async fn pause_closes_every_session_and_resume_reopens() {
    let (controller, devices) = home_controller();
    controller.resolve_roles().await;
    controller.perform(DoorAction::StartFeed).await.unwrap();
    assert_eq!(devices.log.live(), 1);

    controller.handle_lifecycle(LifecycleEvent::Pause).await;
    assert_eq!(devices.log.live(), 0);

    controller.handle_lifecycle(LifecycleEvent::Resume).await;
    assert_eq!(devices.log.live(), 1);
    assert_eq!(controller.sessions().state(FEED_ROLE), SessionState::Open);

    controller.handle_lifecycle(LifecycleEvent::Destroy).await;
    assert_eq!(devices.log.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_door_controller_is_reported_unavailable() {
    let (controller, _) = home_controller();
    let (handle, mut events) = Arc::new(controller).spawn();

    handle.resolve_hosts().await.unwrap();
    handle.perform(DoorAction::OpenDoor).await.unwrap();

    let mut unavailable = Vec::new();
    let mut open_door_failed = false;
    while unavailable.is_empty() || !open_door_failed {
        match events.recv().await.unwrap() {
            ControllerEvent::FeatureUnavailable { role } => unavailable.push(role),
            ControllerEvent::ActionFailed { action: DoorAction::OpenDoor, error } => {
                assert!(matches!(error, Error::NoHostFound { .. }));
                open_door_failed = true;
            }
            ControllerEvent::HostResolved { role, host } => {
                assert_eq!((role.as_str(), host), (FEED_ROLE, home(18)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(unavailable, vec![MAIN_ROLE.to_string()]);

    handle.lifecycle(LifecycleEvent::Destroy).await.unwrap();
    while events.recv().await.is_some() {}
    assert!(matches!(
        handle.perform(DoorAction::StartFeed).await,
        Err(Error::ControllerStopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn pause_during_a_pending_action_leaves_nothing_open() {
    let (controller, devices) = home_controller();
    let (handle, mut events) = Arc::new(controller).spawn();

    // The action is still scanning when the pause is handled.
    handle.perform(DoorAction::StartFeed).await.unwrap();
    handle.lifecycle(LifecycleEvent::Pause).await.unwrap();

    let (mut paused, mut action_error) = (false, None);
    while !paused || action_error.is_none() {
        match events.recv().await.unwrap() {
            ControllerEvent::Lifecycle(LifecycleEvent::Pause) => paused = true,
            ControllerEvent::ActionFailed { action: DoorAction::StartFeed, error } => action_error = Some(error),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(matches!(action_error, Some(Error::SessionUnavailable { .. })));
    assert_eq!(devices.log.live(), 0);

    // The feed host was found along the way, so resume brings it back.
    handle.lifecycle(LifecycleEvent::Resume).await.unwrap();
    match events.recv().await.unwrap() {
        ControllerEvent::Lifecycle(LifecycleEvent::Resume) => {}
        other => panic!("unexpected event: {other:?}"),
    }
    assert_eq!(devices.log.live(), 1);

    handle.lifecycle(LifecycleEvent::Destroy).await.unwrap();
    while events.recv().await.is_some() {}
    assert_eq!(devices.log.live(), 0);
}
