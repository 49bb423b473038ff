//! 作业提交器
//!
//! 把工作负载描述转换为按时间触发的作业注册：每个提交时刻申请一次唤醒回调，
//! 到期时注册所有已到时的作业；全部提交完毕后通知 `RegistrationFinished`。

use super::spec::WorkloadSpec;
use crate::handle::SimulationHandle;
use crate::job::{ExecutionProfile, Job};
use crate::sim::{NotifyType, Result, SimTime};
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug)]
pub struct JobSubmitter {
    name: String,
    profiles: Vec<ExecutionProfile>,
    jobs: VecDeque<Job>,
    simulation_time: Option<SimTime>,
    finished: bool,
}

impl JobSubmitter {
    pub fn new(name: impl Into<String>, spec: &WorkloadSpec) -> Self {
        let name = name.into();
        JobSubmitter {
            profiles: spec.profiles(),
            jobs: spec.jobs(&name).into(),
            simulation_time: spec.simulation_time.map(SimTime::from_secs_f64),
            name,
            finished: true,
        }
    }

    /// 读取工作负载文件；工作负载名取文件名（不含扩展名）
    pub fn load(path: &Path) -> Result<Self> {
        let spec = WorkloadSpec::load(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "w0".to_string());
        Ok(JobSubmitter::new(name, &spec))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn remaining(&self) -> usize {
        self.jobs.len()
    }

    /// 注册全部画像，并申请第一次唤醒
    pub fn start(&mut self, handle: &mut dyn SimulationHandle) -> Result<()> {
        info!(workload = %self.name, jobs = self.jobs.len(), profiles = self.profiles.len(), "📥 启动作业提交器");
        self.finished = false;
        for profile in &self.profiles {
            handle.register_profile(&self.name, profile.clone())?;
        }
        self.rearm(handle)
    }

    /// 唤醒回调：提交所有已到时的作业
    pub fn on_requested_call(&mut self, handle: &mut dyn SimulationHandle, now: SimTime) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        match self.jobs.front() {
            Some(next) if next.subtime > now => return Ok(()),
            None if self.simulation_time.is_some_and(|t| now < t) => return Ok(()),
            _ => {}
        }

        while self.jobs.front().is_some_and(|j| j.subtime <= now) {
            let Some(job) = self.jobs.pop_front() else {
                break;
            };
            debug!(job_id = %job.id, %now, "提交作业");
            handle.register_job(job)?;
        }
        self.rearm(handle)
    }

    fn rearm(&mut self, handle: &mut dyn SimulationHandle) -> Result<()> {
        let now = handle.current_time();
        match self.jobs.front() {
            Some(next) => handle.schedule_callback(next.subtime.max(now)),
            None => match self.simulation_time {
                Some(t) if now < t => handle.schedule_callback(t),
                _ => {
                    self.finished = true;
                    info!(workload = %self.name, "作业提交完毕");
                    handle.notify(NotifyType::RegistrationFinished)
                }
            },
        }
    }
}
