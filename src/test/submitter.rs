use super::{platform, record, run_to_end};
use crate::handle::{SelfContainedHandle, SimulationHandle};
use crate::sim::{EventBody, EventType, NotifyType, SimTime};
use crate::workload::{JobSubmitter, WorkloadSpec};

const WORKLOAD: &str = r#"
{
    "profiles": {
        "p100": { "type": "parallel_homogeneous", "cpu": 100 }
    },
    "jobs": [
        { "id": 2, "subtime": 10.7, "res": 1, "profile": "p100" },
        { "id": "first", "subtime": 0, "res": 2, "walltime": 30.9, "profile": "p100", "user": "alice" }
    ]
}
"#;

fn spec(raw: &str) -> WorkloadSpec {
    serde_json::from_str(raw).expect("parse workload")
}

/// 每个提交的作业都立即拒绝，使仿真只由提交驱动
fn reject_everything(handle: &mut SelfContainedHandle) {
    handle.on(EventType::JobSubmitted, |h, e| match e.body.job_id() {
        Some(id) => h.reject_job(id),
        None => Ok(()),
    });
}

#[test]
fn workload_jobs_are_namespaced_and_sorted() {
    let wl = spec(WORKLOAD);
    let jobs = wl.jobs("w0");
    let ids: Vec<_> = jobs.iter().map(|j| j.id.as_str()).collect();
    assert_eq!(ids, vec!["w0!first", "w0!2"]);
    assert_eq!(jobs[0].walltime, Some(30));
    assert_eq!(jobs[0].user, "alice");
    assert_eq!(jobs[1].subtime, SimTime(10));
    assert_eq!(jobs[1].walltime, None);

    let profiles = wl.profiles();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].name, "p100");
    assert_eq!(profiles[0].cpu_work, 100.0);
}

#[test]
fn jobs_are_registered_at_their_submission_time() {
    let mut handle = SelfContainedHandle::new();
    let log = record(&mut handle, &[EventType::JobSubmitted, EventType::Notify]);
    reject_everything(&mut handle);

    let submitter = JobSubmitter::new("w", &spec(WORKLOAD));
    handle
        .start_with(platform(), Some(submitter), None)
        .expect("start");
    run_to_end(&mut handle);

    let seen: Vec<_> = log
        .borrow()
        .iter()
        .map(|e| match &e.body {
            EventBody::JobSubmitted { job_id, job } => {
                assert_eq!(job.subtime, e.timestamp);
                (e.timestamp, job_id.clone())
            }
            EventBody::Notify { kind } => {
                assert_eq!(*kind, NotifyType::RegistrationFinished);
                (e.timestamp, "notify".to_string())
            }
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        seen,
        vec![
            (SimTime(0), "w!first".to_string()),
            (SimTime(10), "w!2".to_string()),
            (SimTime(10), "notify".to_string()),
        ]
    );
    assert_eq!(handle.current_time(), SimTime(10));
}

#[test]
fn simulation_time_keeps_the_run_alive() {
    let raw = WORKLOAD.replacen("\"profiles\"", "\"simulation_time\": 25.5, \"profiles\"", 1);
    let mut handle = SelfContainedHandle::new();
    reject_everything(&mut handle);
    handle
        .start_with(platform(), Some(JobSubmitter::new("w", &spec(&raw))), None)
        .expect("start");
    run_to_end(&mut handle);
    assert_eq!(handle.current_time(), SimTime(25));
}

#[test]
fn load_names_workload_after_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("night_batch.json");
    std::fs::write(&path, WORKLOAD).expect("write workload");

    let submitter = JobSubmitter::load(&path).expect("load");
    assert_eq!(submitter.name(), "night_batch");
    assert_eq!(submitter.remaining(), 2);
    assert!(submitter.is_finished());

    let missing = JobSubmitter::load(&dir.path().join("absent.json"));
    assert!(matches!(missing, Err(crate::sim::SimError::Description { .. })));
}
