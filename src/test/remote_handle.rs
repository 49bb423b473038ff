use super::{child_process_lock, procs};
use crate::handle::{RemoteHandle, SimulationHandle};
use crate::protocol::RemoteConfig;
use crate::sim::{SimError, SimTime};
use std::path::Path;

#[test]
fn commands_before_start_are_refused() {
    let mut handle = RemoteHandle::new(RemoteConfig::default());
    assert!(!handle.is_running());
    assert!(matches!(handle.advance(), Err(SimError::NotRunning { .. })));
    assert!(matches!(
        handle.execute_job("w!1", &procs("0")),
        Err(SimError::NotRunning { op: "execute_job" })
    ));
    assert!(matches!(
        handle.schedule_callback(SimTime(1)),
        Err(SimError::NotRunning { .. })
    ));
    assert!(matches!(handle.acknowledge(), Err(SimError::NotRunning { .. })));
    handle.finish().expect("finish without start");
    assert!(handle.queued_requests().is_empty());
}

#[test]
fn missing_platform_is_refused() {
    let mut handle = RemoteHandle::new(RemoteConfig::default());
    assert!(matches!(
        handle.start(Path::new(""), None, None),
        Err(SimError::MissingPlatform)
    ));
}

#[test]
fn unknown_program_fails_to_spawn() {
    let mut handle = RemoteHandle::new(RemoteConfig::with_program(
        "/nonexistent/schedsim-external-simulator",
    ));
    assert!(matches!(
        handle.start(Path::new("platform.json"), None, None),
        Err(SimError::Io(_))
    ));
    assert!(!handle.is_running());
}

#[cfg(unix)]
#[test]
fn process_exiting_before_handshake_is_reported() {
    let _guard = child_process_lock();
    let mut handle = RemoteHandle::new(RemoteConfig::with_program("false"));
    let result = handle.start(Path::new("platform.json"), None, None);
    match result {
        Err(SimError::ProcessExited { status }) => assert!(!status.success()),
        other => panic!("expected ProcessExited, got {other:?}"),
    }
    assert!(!handle.is_running());
    assert!(handle.address().is_none());
}
