use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

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

fn run(args: &[&str]) -> Output {
    let output = Command::new(env!("CARGO_BIN_EXE_schedsim"))
        .args(args)
        .output()
        .expect("run schedsim");
    assert!(
        output.status.success(),
        "schedsim failed: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn stat(stdout: &str, key: &str) -> u64 {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(key)?.strip_prefix(' '))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_else(|| panic!("missing `{key}` in stdout:\n{stdout}"))
}

#[test]
fn schedsim_runs_workload_to_completion() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = write_file(dir.path(), "platform.json", PLATFORM);
    let workload = write_file(dir.path(), "w.json", WORKLOAD);

    let output = run(&[
        "--platform",
        platform.to_str().unwrap(),
        "--workload",
        workload.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    // 1: 0..50 on 0-1；2: 5..45 on 2-3（walltime）；3: 50..150 on 0-3；4: 拒绝
    assert_eq!(stat(&stdout, "jobs_completed"), 3);
    assert_eq!(stat(&stdout, "jobs_walltime_reached"), 1);
    assert_eq!(stat(&stdout, "jobs_rejected"), 1);
    assert_eq!(stat(&stdout, "jobs_killed"), 0);
    assert_eq!(stat(&stdout, "makespan"), 150);
}

#[test]
fn schedsim_writes_event_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = write_file(dir.path(), "platform.json", PLATFORM);
    let workload = write_file(dir.path(), "w.json", WORKLOAD);
    let out = dir.path().join("out").join("run");

    run(&[
        "--platform",
        platform.to_str().unwrap(),
        "--workload",
        workload.to_str().unwrap(),
        "--output",
        out.to_str().unwrap(),
    ]);

    let raw = fs::read_to_string(dir.path().join("out").join("run_events.json"))
        .expect("read event log");
    let v: Value = serde_json::from_str(&raw).expect("parse event log");
    let arr = v.as_array().expect("event log must be a JSON array");
    assert_eq!(arr[0]["type"], "SIMULATION_BEGINS");
    assert_eq!(arr[arr.len() - 1]["type"], "SIMULATION_ENDS");

    let mut last = 0.0;
    for event in arr {
        let t = event["timestamp"].as_f64().expect("timestamp");
        assert!(t >= last, "timestamps must not decrease");
        last = t;
    }
    let submitted = arr.iter().filter(|e| e["type"] == "JOB_SUBMITTED").count();
    assert_eq!(submitted, 4);
}

#[test]
fn schedsim_until_stops_early() {
    let dir = tempfile::tempdir().expect("tempdir");
    let platform = write_file(dir.path(), "platform.json", PLATFORM);
    let workload = write_file(dir.path(), "w.json", WORKLOAD);

    let output = run(&[
        "--platform",
        platform.to_str().unwrap(),
        "--workload",
        workload.to_str().unwrap(),
        "--until",
        "45",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stat(&stdout, "jobs_completed"), 1);
    assert!(stat(&stdout, "sim_time") >= 45);
}

#[test]
fn schedsim_reports_missing_platform() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_schedsim"))
        .args(["--platform", dir.path().join("absent.json").to_str().unwrap()])
        .output()
        .expect("run schedsim");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("absent.json"));
}
