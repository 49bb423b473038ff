//! 自包含后端
//!
//! 在进程内维护事件队列，直接计算作业运行时间与功耗状态切换，从不阻塞。

use super::callbacks::{Callback, CallbackRegistry, Dispatch, dispatch_one};
use super::ledger::{JobLedger, KillOutcome};
use super::SimulationHandle;
use crate::job::{ExecutionProfile, Job, JobId, JobState, plan_completion};
use crate::monitor::{self, EventLog, Monitor};
use crate::platform::{Platform, PlatformSpec, PowerStateId, ProcSet};
use crate::power;
use crate::sim::{
    Event, EventBody, EventQueue, EventType, NotifyType, Result, SimError, SimTime,
};
use crate::workload::JobSubmitter;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 进程内仿真句柄
#[derive(Default)]
pub struct SelfContainedHandle {
    now: SimTime,
    queue: EventQueue,
    callbacks: CallbackRegistry,
    monitors: Vec<Box<dyn Monitor>>,
    profiles: HashMap<String, ExecutionProfile>,
    ledger: JobLedger,
    platform: Option<Platform>,
    submitter: Option<JobSubmitter>,
    submitter_ended: bool,
    output: Option<PathBuf>,
    running: bool,
    dispatching: bool,
}

impl SelfContainedHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 下一个待处理事件的时间
    pub fn next_event_time(&self) -> Option<SimTime> {
        self.queue.peek_earliest().map(|e| e.timestamp)
    }

    /// 仍在队列中的事件数
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    /// 使用已构建的平台开始仿真（不读取描述文件）
    pub fn start_with(
        &mut self,
        platform: Platform,
        submitter: Option<JobSubmitter>,
        output: Option<&Path>,
    ) -> Result<()> {
        if self.running {
            return Err(SimError::AlreadyRunning);
        }
        if self.dispatching {
            return Err(SimError::Reentrant { op: "start" });
        }

        info!(
            resources = platform.resource_count(),
            workload = submitter.as_ref().map(|s| s.name()),
            "▶️  开始自包含仿真"
        );
        self.now = SimTime::ZERO;
        self.queue.clear();
        self.ledger.clear();
        self.profiles.clear();
        self.output = output.map(Path::to_path_buf);
        // 没有提交器时视为提交已结束；动态注册作业的驱动可通知 ContinueRegistration
        self.submitter_ended = submitter.is_none();
        if self.output.is_some() && self.monitors.is_empty() {
            self.monitors.push(Box::new(EventLog::new()));
        }

        self.queue.add(Event::new(
            self.now,
            EventBody::SimulationBegins {
                platform: platform.clone(),
            },
        ));
        self.platform = Some(platform);
        self.running = true;

        if let Some(mut submitter) = submitter {
            let started = submitter.start(self);
            self.submitter = Some(submitter);
            started?;
        }

        self.dispatch_due()
    }

    /// 分发所有时间戳不晚于当前时间的事件（包括分发过程中新加入的）
    fn dispatch_due(&mut self) -> Result<()> {
        let outer = std::mem::replace(&mut self.dispatching, true);
        let result = self.drain_due();
        self.dispatching = outer;
        result
    }

    fn drain_due(&mut self) -> Result<()> {
        while let Some(event) = self.queue.pop_due(self.now) {
            dispatch_one(self, event)?;
        }
        Ok(())
    }

    fn ensure_running(&self, op: &'static str) -> Result<()> {
        if self.running {
            Ok(())
        } else {
            Err(SimError::NotRunning { op })
        }
    }

    fn platform_ref(&self, op: &'static str) -> Result<&Platform> {
        self.platform.as_ref().ok_or(SimError::NotRunning { op })
    }
}

impl Dispatch for SelfContainedHandle {
    fn callbacks_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.callbacks
    }

    fn monitors_mut(&mut self) -> &mut Vec<Box<dyn Monitor>> {
        &mut self.monitors
    }

    fn platform_mut(&mut self) -> Option<&mut Platform> {
        self.platform.as_mut()
    }

    fn ledger_mut(&mut self) -> &mut JobLedger {
        &mut self.ledger
    }

    fn before_callbacks(&mut self, event: &Event) -> Result<()> {
        if event.event_type() != EventType::RequestedCall {
            return Ok(());
        }
        // 暂时把提交器取出来，避免 &mut self 与 &mut submitter 的重叠借用。
        if let Some(mut submitter) = self.submitter.take() {
            let fed = submitter.on_requested_call(self, event.timestamp);
            if self.submitter.is_none() && self.running {
                self.submitter = Some(submitter);
            }
            fed?;
        }
        Ok(())
    }
}

impl SimulationHandle for SelfContainedHandle {
    fn is_running(&self) -> bool {
        self.running
    }

    fn current_time(&self) -> SimTime {
        self.now
    }

    fn platform(&self) -> Option<&Platform> {
        self.platform.as_ref()
    }

    fn start(&mut self, platform: &Path, workload: Option<&Path>, output: Option<&Path>) -> Result<()> {
        if self.running {
            return Err(SimError::AlreadyRunning);
        }
        if platform.as_os_str().is_empty() {
            return Err(SimError::MissingPlatform);
        }
        let platform = PlatformSpec::load(platform)?.build()?;
        let submitter = workload.map(JobSubmitter::load).transpose()?;
        self.start_with(platform, submitter, output)
    }

    fn advance(&mut self) -> Result<()> {
        self.ensure_running("advance")?;
        if self.dispatching {
            return Err(SimError::Reentrant { op: "advance" });
        }

        match self.next_event_time() {
            None if self.submitter_ended && !self.ledger.has_pending() => {
                debug!(now = %self.now, "没有后续工作，结束仿真");
                self.finish()
            }
            None => Err(SimError::NoPendingWork { now: self.now }),
            Some(next) => {
                self.now = self.now.max(next);
                debug!(now = %self.now, queue_size = self.queue.len(), "推进仿真时间");
                self.dispatch_due()
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        info!(now = %self.now, "⏹️  结束自包含仿真");
        self.running = false;
        self.submitter_ended = true;
        self.submitter = None;
        self.queue.clear();
        self.profiles.clear();
        self.ledger.clear();
        self.queue
            .add(Event::new(self.now, EventBody::SimulationEnds {}));
        let dispatched = self.dispatch_due();

        if let Some(output) = &self.output {
            monitor::persist_all(&self.monitors, output)?;
        }
        dispatched
    }

    fn acknowledge(&mut self) -> Result<()> {
        Ok(())
    }

    #[tracing::instrument(skip(self, alloc), fields(alloc = %alloc, now = %self.now))]
    fn execute_job(&mut self, job_id: &str, alloc: &ProcSet) -> Result<()> {
        self.ensure_running("execute_job")?;
        let job = self.ledger.ensure_pending("execute_job", job_id)?;
        let profile = self
            .profiles
            .get(&job.profile)
            .ok_or_else(|| SimError::UnknownProfile {
                job_id: job.id.clone(),
                profile: job.profile.clone(),
            })?;
        let resources = self.platform_ref("execute_job")?.resources_in(alloc)?;
        let completion = plan_completion(job, profile, &resources, self.now)?;

        let job = self.ledger.start("execute_job", job_id)?;
        debug!(completes_at = %completion.at, state = ?completion.state, "作业开始执行");
        self.queue.add(Event::new(
            self.now,
            EventBody::JobAllocated {
                job_id: job.id.clone(),
                alloc: alloc.clone(),
            },
        ));
        self.queue.add(Event::new(
            self.now,
            EventBody::JobStarted {
                job_id: job.id.clone(),
                alloc: alloc.clone(),
            },
        ));
        self.queue.add(Event::new(
            completion.at,
            EventBody::JobCompleted {
                job_id: job.id,
                job_state: completion.state,
                return_code: 0,
                alloc: alloc.clone(),
            },
        ));
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn reject_job(&mut self, job_id: &str) -> Result<()> {
        self.ensure_running("reject_job")?;
        let job = self.ledger.reject("reject_job", job_id)?;
        self.queue
            .add(Event::new(self.now, EventBody::JobRejected { job_id: job.id }));
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(now = %self.now))]
    fn kill_jobs(&mut self, job_ids: &[JobId]) -> Result<()> {
        self.ensure_running("kill_jobs")?;
        let mut killed = Vec::with_capacity(job_ids.len());
        let mut released = ProcSet::new();
        for (id, outcome) in self.ledger.kill(job_ids)? {
            match outcome {
                KillOutcome::Running => {
                    let cancelled = self.queue.cancel_where(|e| {
                        matches!(&e.body, EventBody::JobCompleted { job_id, .. } if *job_id == id)
                    });
                    for event in &cancelled {
                        if let EventBody::JobCompleted { alloc, .. } = &event.body {
                            released.union(alloc);
                        }
                    }
                }
                KillOutcome::Pending(_) => {}
                KillOutcome::AlreadyDone => {
                    warn!(job_id = %id, "作业已完成，忽略终止请求");
                    continue;
                }
            }
            killed.push(id);
        }
        if killed.is_empty() {
            return Ok(());
        }
        self.queue.add(Event::new(
            self.now,
            EventBody::JobKilled {
                job_ids: killed,
                alloc: released,
            },
        ));
        Ok(())
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    fn register_job(&mut self, mut job: Job) -> Result<()> {
        self.ensure_running("register_job")?;
        job.subtime = self.now;
        job.state = JobState::Submitted;
        self.ledger.register(job.clone())?;
        self.queue.add(Event::new(
            self.now,
            EventBody::JobSubmitted {
                job_id: job.id.clone(),
                job,
            },
        ));
        Ok(())
    }

    fn register_profile(&mut self, workload: &str, profile: ExecutionProfile) -> Result<()> {
        self.ensure_running("register_profile")?;
        debug!(workload, profile = %profile.name, kind = %profile.kind, "注册画像");
        self.profiles.insert(profile.name.clone(), profile);
        Ok(())
    }

    #[tracing::instrument(skip(self, resources), fields(resources = %resources, now = %self.now))]
    fn set_resource_power_state(&mut self, resources: &ProcSet, state: PowerStateId) -> Result<()> {
        self.ensure_running("set_resource_power_state")?;
        let plan = power::plan(self.platform_ref("set_resource_power_state")?, resources, state)?;
        for event in plan
            .transition_events(self.now)
            .into_iter()
            .chain(plan.final_events(self.now))
        {
            self.queue.add(event);
        }
        Ok(())
    }

    fn schedule_callback(&mut self, at: SimTime) -> Result<()> {
        self.ensure_running("schedule_callback")?;
        if at < self.now {
            return Err(SimError::CallbackInPast { at, now: self.now });
        }
        let exists = self
            .queue
            .contains(|e| e.timestamp == at && e.event_type() == EventType::RequestedCall);
        if !exists {
            self.queue.add(Event::new(at, EventBody::RequestedCall {}));
        }
        Ok(())
    }

    fn notify(&mut self, kind: NotifyType) -> Result<()> {
        self.ensure_running("notify")?;
        match kind {
            NotifyType::NoMoreStaticJobToSubmit | NotifyType::RegistrationFinished => {
                self.submitter_ended = true;
            }
            NotifyType::ContinueRegistration => self.submitter_ended = false,
            NotifyType::NoMoreExternalEventToOccur => {}
        }
        self.queue
            .add(Event::new(self.now, EventBody::Notify { kind }));
        Ok(())
    }

    fn set_callback(&mut self, event_type: EventType, callback: Callback) {
        self.callbacks.register(event_type, callback);
    }

    fn add_monitor(&mut self, monitor: Box<dyn Monitor>) {
        self.monitors.push(monitor);
    }
}
