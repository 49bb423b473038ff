use schedsim_rs::handle::{RemoteHandle, SimulationHandle};
use schedsim_rs::job::Job;
use schedsim_rs::monitor::EventLog;
use schedsim_rs::platform::{PowerStateId, PowerStateKind, ResourceId};
use schedsim_rs::policy::FirstComeFirstServed;
use schedsim_rs::protocol::RemoteConfig;
use schedsim_rs::sim::{EventBody, EventType, SimError, SimTime};
use serde_json::Value;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

const PLATFORM: &str = r#"
{
    "nodes": [
        {
            "id": 0,
            "power_states": [
                { "id": 0, "kind": "computation", "speed": 1.0 },
                { "id": 1, "kind": "sleep", "speed": 0.1 },
                { "id": 2, "kind": "switching_off", "speed": 0.5 },
                { "id": 3, "kind": "switching_on", "speed": 0.25 }
            ],
            "resources": [ { "id": 0, "speed": 2.0 }, { "id": 1, "speed": 2.0 } ]
        },
        {
            "id": 1,
            "power_states": [
                { "id": 0, "kind": "computation", "speed": 1.0 },
                { "id": 1, "kind": "sleep", "speed": 0.1 },
                { "id": 2, "kind": "switching_off", "speed": 0.5 },
                { "id": 3, "kind": "switching_on", "speed": 0.25 }
            ],
            "resources": [ { "id": 2, "speed": 1.0 }, { "id": 3, "speed": 1.0 } ]
        }
    ]
}
"#;

const WORKLOAD: &str = r#"
{
    "profiles": {
        "p100": { "type": "parallel_homogeneous", "cpu": 100 },
        "t400": { "type": "parallel_homogeneous_total", "cpu": 400 }
    },
    "jobs": [
        { "id": 1, "subtime": 0, "res": 2, "walltime": 1000, "profile": "p100" },
        { "id": 2, "subtime": 5, "res": 2, "walltime": 40, "profile": "p100" },
        { "id": 3, "subtime": 20, "res": 4, "profile": "t400" },
        { "id": 4, "subtime": 30, "res": 8, "profile": "p100" }
    ]
}
"#;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write temp file");
    path
}

fn server() -> RemoteConfig {
    RemoteConfig::with_program(env!("CARGO_BIN_EXE_schedsim_server"))
}

fn summary(args: &[&str]) -> Vec<String> {
    let output = Command::new(env!("CARGO_BIN_EXE_schedsim"))
        .args(args)
        .output()
        .expect("run schedsim");
    assert!(
        output.status.success(),
        "schedsim failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter(|line| line.starts_with("jobs_") || line.starts_with("makespan "))
        .map(str::to_string)
        .collect()
}

#[test]
fn remote_backend_matches_self_contained_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = write_file(dir.path(), "platform.json", PLATFORM);
    let workload = write_file(dir.path(), "w.json", WORKLOAD);
    let base = [
        "--platform",
        platform.to_str().unwrap(),
        "--workload",
        workload.to_str().unwrap(),
    ];

    let local = summary(&base);
    let mut remote_args = base.to_vec();
    remote_args.extend(["--remote", env!("CARGO_BIN_EXE_schedsim_server")]);
    let remote = summary(&remote_args);

    assert_eq!(local.len(), 5);
    assert_eq!(local, remote);
}

#[test]
fn remote_handle_drives_policy_and_sees_completions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = write_file(dir.path(), "platform.json", PLATFORM);
    let workload = write_file(dir.path(), "w.json", WORKLOAD);

    let mut handle = RemoteHandle::new(server());
    let policy = FirstComeFirstServed::attach(&mut handle);
    let completed = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&completed);
    handle.on(EventType::JobCompleted, move |_, e| {
        if let EventBody::JobCompleted { job_id, .. } = &e.body {
            log.borrow_mut().push((e.timestamp, job_id.clone()));
        }
        Ok(())
    });

    handle
        .start(&platform, Some(&workload), None)
        .expect("start remote");
    assert!(handle.is_running());
    assert!(handle.address().is_some_and(|a| a.starts_with("tcp://127.0.0.1:")));
    assert_eq!(handle.platform().map(|p| p.resource_count()), Some(4));

    let mut steps = 0;
    while handle.is_running() {
        handle.advance().expect("advance");
        steps += 1;
        assert!(steps < 1_000, "remote simulation did not terminate");
    }
    handle.finish().expect("finish");

    assert_eq!(
        *completed.borrow(),
        vec![
            (SimTime(45), "w!2".to_string()),
            (SimTime(50), "w!1".to_string()),
            (SimTime(150), "w!3".to_string()),
        ]
    );
    assert_eq!(policy.borrow().rejected(), 1);
}

#[test]
fn remote_power_transitions_are_dispatched_locally() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = write_file(dir.path(), "platform.json", PLATFORM);

    let mut handle = RemoteHandle::new(server());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    handle.on(EventType::ResourcePowerStateChanged, move |_, e| {
        if let EventBody::ResourcePowerStateChanged { resources, state } = &e.body {
            log.borrow_mut().push((e.timestamp, resources.to_string(), state.0));
        }
        Ok(())
    });

    handle.start(&platform, None, None).expect("start remote");
    handle
        .set_resource_power_state(&"0".parse().expect("procs"), PowerStateId(1))
        .expect("sleep");
    // 过渡状态立即在本地分发
    assert_eq!(*seen.borrow(), vec![(SimTime(0), "0-1".to_string(), 2)]);

    handle.schedule_callback(SimTime(5)).expect("schedule");
    while handle.current_time() < SimTime(5) {
        handle.advance().expect("advance");
    }
    assert_eq!(
        *seen.borrow(),
        vec![
            (SimTime(0), "0-1".to_string(), 2),
            (SimTime(2), "0-1".to_string(), 1),
        ]
    );
    let kind = handle
        .platform()
        .and_then(|p| p.current_power_state(ResourceId(1)).ok())
        .map(|s| s.kind);
    assert_eq!(kind, Some(PowerStateKind::Sleep));

    handle.finish().expect("finish");
    assert!(!handle.is_running());
    handle.finish().expect("second finish");
}

#[test]
fn remote_event_log_records_simulation_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = write_file(dir.path(), "platform.json", PLATFORM);
    let workload = write_file(dir.path(), "w.json", WORKLOAD);
    let output = dir.path().join("out").join("remote");

    let mut handle = RemoteHandle::new(server());
    let _policy = FirstComeFirstServed::attach(&mut handle);
    handle.add_monitor(Box::new(EventLog::new()));
    handle
        .start(&platform, Some(&workload), Some(&output))
        .expect("start remote");
    let mut steps = 0;
    while handle.is_running() {
        handle.advance().expect("advance");
        steps += 1;
        assert!(steps < 1_000, "remote simulation did not terminate");
    }
    handle.finish().expect("finish");

    let raw = fs::read_to_string(dir.path().join("out").join("remote_events.json"))
        .expect("read event log");
    let v: Value = serde_json::from_str(&raw).expect("parse event log");
    let arr = v.as_array().expect("array");
    assert_eq!(arr[0]["type"], "SIMULATION_BEGINS");
    assert_eq!(arr[arr.len() - 1]["type"], "SIMULATION_ENDS");
    let ends = arr.iter().filter(|e| e["type"] == "SIMULATION_ENDS").count();
    assert_eq!(ends, 1);
}

#[test]
fn external_failure_mid_run_fails_advance_and_finish_cleans_up() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = write_file(dir.path(), "platform.json", PLATFORM);

    let mut handle = RemoteHandle::new(server());
    let ends = Rc::new(RefCell::new(0));
    let count = Rc::clone(&ends);
    handle.on(EventType::SimulationEnds, move |_, _| {
        *count.borrow_mut() += 1;
        Ok(())
    });
    handle.start(&platform, None, None).expect("start remote");

    // 外部进程不认识该作业的 profile，执行时出错退出
    handle
        .register_job(Job::new("dyn!1", "missing", 1, None))
        .expect("register");
    handle
        .execute_job("dyn!1", &"0".parse().expect("procs"))
        .expect("execute");
    match handle.advance() {
        Err(SimError::ProcessExited { status }) => assert!(!status.success()),
        Err(SimError::ChannelClosed) => {}
        other => panic!("expected the external process to be gone, got {other:?}"),
    }

    assert!(handle.is_running());
    handle.finish().expect("finish after failure");
    assert!(!handle.is_running());
    assert_eq!(*ends.borrow(), 1);
    handle.finish().expect("second finish");
    assert_eq!(*ends.borrow(), 1);
}
