//! 作业执行模型
//!
//! 根据画像与所分配资源的速度计算作业的完成时间与结局（仅自包含后端使用）。

use super::job::{Job, JobState};
use super::profile::{ExecutionProfile, ProfileKind};
use crate::platform::Resource;
use crate::sim::{Result, SimError, SimTime};
use tracing::debug;

/// 作业的计划完成情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub at: SimTime,
    /// 不受 walltime 限制时所需的运行时间（秒）
    pub runtime: u64,
    pub state: JobState,
}

/// 计算所需运行时间：最慢的资源决定并行进度。
pub fn required_runtime(job: &Job, profile: &ExecutionProfile, alloc: &[&Resource]) -> Result<u64> {
    let min_speed = alloc
        .iter()
        .map(|r| r.speed)
        .reduce(f64::min)
        .ok_or_else(|| SimError::EmptyAllocation {
            job_id: job.id.clone(),
        })?;

    let work = match profile.kind {
        ProfileKind::ParallelHomogeneous => profile.cpu_work,
        ProfileKind::ParallelHomogeneousTotal => profile.cpu_work / f64::from(job.res),
        kind => {
            return Err(SimError::UnsupportedProfile {
                profile: profile.name.clone(),
                kind: kind.to_string(),
            });
        }
    };
    Ok((work / min_speed) as u64)
}

/// 计划作业完成：`now + min(runtime, walltime)`，walltime 严格大于 runtime 时判为成功。
pub fn plan_completion(
    job: &Job,
    profile: &ExecutionProfile,
    alloc: &[&Resource],
    now: SimTime,
) -> Result<Completion> {
    let runtime = required_runtime(job, profile, alloc)?;
    let (elapsed, state) = match job.walltime {
        Some(walltime) if walltime <= runtime => (walltime, JobState::CompletedWalltimeReached),
        _ => (runtime, JobState::CompletedSuccessfully),
    };
    debug!(job_id = %job.id, runtime, elapsed, ?state, "计划作业完成");
    Ok(Completion {
        at: now.saturating_add(elapsed),
        runtime,
        state,
    })
}
