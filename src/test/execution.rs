use super::{job, platform, procs, profile};
use crate::job::{ExecutionProfile, JobState, ProfileKind, plan_completion, required_runtime};
use crate::sim::{SimError, SimTime};

#[test]
fn runtime_uses_slowest_resource() {
    let p = platform();
    let j = job("j", "p", 2, None);
    // 资源 1 速度 2，资源 2 速度 1
    let alloc = p.resources_in(&procs("1-2")).expect("alloc");
    let runtime = required_runtime(&j, &profile("p", 100.0), &alloc).expect("runtime");
    assert_eq!(runtime, 100);
}

#[test]
fn completes_successfully_within_walltime() {
    let p = platform();
    let alloc = p.resources_in(&procs("0")).expect("alloc");
    let c = plan_completion(&job("j", "p", 1, Some(1000)), &profile("p", 100.0), &alloc, SimTime(7))
        .expect("plan");
    assert_eq!(c.runtime, 50);
    assert_eq!(c.at, SimTime(57));
    assert_eq!(c.state, JobState::CompletedSuccessfully);
}

#[test]
fn walltime_cuts_execution_short() {
    let p = platform();
    let alloc = p.resources_in(&procs("0")).expect("alloc");
    let c = plan_completion(&job("j", "p", 1, Some(40)), &profile("p", 100.0), &alloc, SimTime(0))
        .expect("plan");
    assert_eq!(c.at, SimTime(40));
    assert_eq!(c.state, JobState::CompletedWalltimeReached);

    // walltime 恰好等于运行时间也算超时
    let c = plan_completion(&job("j", "p", 1, Some(50)), &profile("p", 100.0), &alloc, SimTime(0))
        .expect("plan");
    assert_eq!(c.at, SimTime(50));
    assert_eq!(c.state, JobState::CompletedWalltimeReached);
}

#[test]
fn total_profile_splits_work_across_requested_resources() {
    let p = platform();
    let alloc = p.resources_in(&procs("2-3")).expect("alloc");
    let total = ExecutionProfile::new("t", ProfileKind::ParallelHomogeneousTotal, 100.0);
    let c = plan_completion(&job("j", "t", 4, None), &total, &alloc, SimTime(0)).expect("plan");
    assert_eq!(c.runtime, 25);
}

#[test]
fn unsupported_profile_and_empty_alloc_fail() {
    let p = platform();
    let alloc = p.resources_in(&procs("0")).expect("alloc");
    let delay = ExecutionProfile::new("d", ProfileKind::Delay, 10.0);
    assert!(matches!(
        required_runtime(&job("j", "d", 1, None), &delay, &alloc),
        Err(SimError::UnsupportedProfile { .. })
    ));
    assert!(matches!(
        required_runtime(&job("j", "p", 1, None), &profile("p", 1.0), &[]),
        Err(SimError::EmptyAllocation { .. })
    ));
}
