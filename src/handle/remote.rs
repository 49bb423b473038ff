//! 远程后端
//!
//! 把作业运行与功耗切换委托给外部仿真进程：命令先累积为请求批，
//! 每次 `advance` 发送一批并阻塞等待一批事件。作业开始、提交、拒绝以及
//! 功耗过渡状态在本地立即分发，不等外部进程回显。

use super::SimulationHandle;
use super::callbacks::{Callback, CallbackRegistry, Dispatch, dispatch_one};
use super::ledger::JobLedger;
use crate::job::{ExecutionProfile, Job, JobId, JobState};
use crate::monitor::{self, Monitor};
use crate::platform::{Platform, PowerStateId, ProcSet};
use crate::power;
use crate::protocol::{RemoteConfig, RequestBatch, Transport};
use crate::sim::{
    Event, EventBody, EventType, Inbound, Message, NotifyType, Outbound, Request, RequestBody, Result,
    SimError, SimTime,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 唤醒请求的时间偏移，保证外部进程在整数秒之后回调
const CALL_ME_LATER_OFFSET: f64 = 0.0009;

/// 基于外部仿真进程的句柄
pub struct RemoteHandle {
    config: RemoteConfig,
    transport: Option<Transport>,
    now: SimTime,
    batch: RequestBatch,
    callbacks: CallbackRegistry,
    monitors: Vec<Box<dyn Monitor>>,
    ledger: JobLedger,
    platform: Option<Platform>,
    pending_calls: BTreeSet<SimTime>,
    output: Option<PathBuf>,
    dispatching: bool,
    wrapped_up: bool,
}

impl RemoteHandle {
    pub fn new(config: RemoteConfig) -> Self {
        RemoteHandle {
            config,
            transport: None,
            now: SimTime::ZERO,
            batch: RequestBatch::new(),
            callbacks: CallbackRegistry::default(),
            monitors: Vec::new(),
            ledger: JobLedger::default(),
            platform: None,
            pending_calls: BTreeSet::new(),
            output: None,
            dispatching: false,
            wrapped_up: true,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// 尚未发送的请求
    pub fn queued_requests(&self) -> &[Request] {
        self.batch.requests()
    }

    /// 绑定地址（仿真运行中）
    pub fn address(&self) -> Option<&str> {
        self.transport.as_ref().map(Transport::address)
    }

    fn ensure_running(&self, op: &'static str) -> Result<()> {
        if self.transport.is_some() {
            Ok(())
        } else {
            Err(SimError::NotRunning { op })
        }
    }

    fn transport_mut(&mut self, op: &'static str) -> Result<&mut Transport> {
        self.transport.as_mut().ok_or(SimError::NotRunning { op })
    }

    fn queue_request(&mut self, body: RequestBody) {
        let request = Request::new(self.now, body);
        debug!(request = request.body.name(), now = %self.now, "请求入批");
        self.batch.push(request);
    }

    /// 握手：接收外部进程的第一批事件，其中必须包含平台快照
    fn handshake(&mut self) -> Result<()> {
        let msg: Message<Inbound> = self.transport_mut("start")?.recv()?;
        self.now = msg.now;
        let platform = msg.events.iter().find_map(|e| match &e.body {
            EventBody::SimulationBegins { platform } => Some(platform.clone()),
            _ => None,
        });
        let Some(platform) = platform else {
            return Err(SimError::malformed(
                "handshake did not carry SIMULATION_BEGINS",
            ));
        };
        info!(resources = platform.resource_count(), now = %self.now, "🤝 握手完成");
        self.platform = Some(platform);
        self.dispatch_inbound(msg.events)
    }

    /// 分发外部进程发来的事件
    fn dispatch_inbound(&mut self, events: Vec<Event>) -> Result<()> {
        let outer = std::mem::replace(&mut self.dispatching, true);
        let result = self.drain_inbound(events);
        self.dispatching = outer;
        result
    }

    fn drain_inbound(&mut self, events: Vec<Event>) -> Result<()> {
        for event in events {
            match &event.body {
                EventBody::JobSubmitted { job, .. } => self.ledger.register(job.clone())?,
                EventBody::RequestedCall {} => {
                    let at = event.timestamp;
                    self.pending_calls.retain(|&t| t > at);
                }
                _ => {}
            }
            let ends = event.event_type() == EventType::SimulationEnds;
            let dispatched = dispatch_one(self, event);
            if ends {
                // 监视器已看到 SIMULATION_ENDS 之后再写出
                let persisted = self.wrap_up();
                dispatched?;
                return persisted;
            }
            dispatched?;
        }
        Ok(())
    }

    /// 分发本地合成的事件
    fn dispatch_local(&mut self, events: Vec<Event>) -> Result<()> {
        let outer = std::mem::replace(&mut self.dispatching, true);
        let mut result = Ok(());
        for event in events {
            result = dispatch_one(self, event);
            if result.is_err() {
                break;
            }
        }
        self.dispatching = outer;
        result
    }

    /// 确认并关闭外部进程与通道
    fn shut_down(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            info!(now = %self.now, "⏹️  关闭外部仿真进程");
            let ack: Message<Outbound> = Message::new(self.now, Vec::new());
            transport.close(Some(&ack));
        }
        self.batch.clear();
        self.pending_calls.clear();
    }

    fn wrap_up(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.wrapped_up, true) {
            return Ok(());
        }
        match &self.output {
            Some(output) => monitor::persist_all(&self.monitors, output),
            None => Ok(()),
        }
    }
}

impl Dispatch for RemoteHandle {
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
        if event.event_type() == EventType::SimulationEnds && self.transport.is_some() {
            self.shut_down();
        }
        Ok(())
    }
}

impl SimulationHandle for RemoteHandle {
    fn is_running(&self) -> bool {
        self.transport.is_some()
    }

    fn current_time(&self) -> SimTime {
        self.now
    }

    fn platform(&self) -> Option<&Platform> {
        self.platform.as_ref()
    }

    fn start(&mut self, platform: &Path, workload: Option<&Path>, output: Option<&Path>) -> Result<()> {
        if self.transport.is_some() {
            return Err(SimError::AlreadyRunning);
        }
        if self.dispatching {
            return Err(SimError::Reentrant { op: "start" });
        }
        if platform.as_os_str().is_empty() {
            return Err(SimError::MissingPlatform);
        }

        let transport = Transport::launch(&self.config, platform, workload, output)?;
        self.transport = Some(transport);
        self.now = SimTime::ZERO;
        self.batch.clear();
        self.ledger.clear();
        self.pending_calls.clear();
        self.output = output.map(Path::to_path_buf);
        self.wrapped_up = false;

        if let Err(e) = self.handshake() {
            self.shut_down();
            return Err(e);
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        self.ensure_running("advance")?;
        if self.dispatching {
            return Err(SimError::Reentrant { op: "advance" });
        }

        let msg = Message::new(self.now, self.batch.drain());
        debug!(now = %self.now, requests = msg.events.len(), "发送请求批并等待事件");
        let transport = self.transport_mut("advance")?;
        transport.send(&msg)?;
        let reply: Message<Inbound> = transport.recv()?;

        self.now = self.now.max(reply.now);
        debug!(now = %self.now, events = reply.events.len(), "收到事件批");
        self.dispatch_inbound(reply.events)
    }

    fn finish(&mut self) -> Result<()> {
        if self.transport.is_none() {
            return Ok(());
        }
        self.shut_down();
        let dispatched = self.dispatch_local(vec![Event::new(self.now, EventBody::SimulationEnds {})]);
        self.wrap_up()?;
        dispatched
    }

    fn acknowledge(&mut self) -> Result<()> {
        let msg: Message<Outbound> = Message::new(self.now, Vec::new());
        self.transport_mut("acknowledge")?.send(&msg)
    }

    #[tracing::instrument(skip(self, alloc), fields(alloc = %alloc, now = %self.now))]
    fn execute_job(&mut self, job_id: &str, alloc: &ProcSet) -> Result<()> {
        self.ensure_running("execute_job")?;
        self.ledger.ensure_pending("execute_job", job_id)?;
        if let Some(platform) = &self.platform {
            platform.resources_in(alloc)?;
        }
        let job = self.ledger.start("execute_job", job_id)?;

        self.queue_request(RequestBody::ExecuteJob {
            job_id: job.id.clone(),
            alloc: alloc.clone(),
        });
        self.dispatch_local(vec![
            Event::new(
                self.now,
                EventBody::JobAllocated {
                    job_id: job.id.clone(),
                    alloc: alloc.clone(),
                },
            ),
            Event::new(
                self.now,
                EventBody::JobStarted {
                    job_id: job.id,
                    alloc: alloc.clone(),
                },
            ),
        ])
    }

    #[tracing::instrument(skip(self))]
    fn reject_job(&mut self, job_id: &str) -> Result<()> {
        self.ensure_running("reject_job")?;
        let job = self.ledger.reject("reject_job", job_id)?;
        self.queue_request(RequestBody::RejectJob {
            job_id: job.id.clone(),
        });
        self.dispatch_local(vec![Event::new(
            self.now,
            EventBody::JobRejected { job_id: job.id },
        )])
    }

    #[tracing::instrument(skip(self), fields(now = %self.now))]
    fn kill_jobs(&mut self, job_ids: &[JobId]) -> Result<()> {
        self.ensure_running("kill_jobs")?;
        let mut to_kill = Vec::with_capacity(job_ids.len());
        for (id, outcome) in self.ledger.kill(job_ids)? {
            if outcome.is_killed() {
                to_kill.push(id);
            } else {
                warn!(job_id = %id, "作业已完成，忽略终止请求");
            }
        }
        if !to_kill.is_empty() {
            self.queue_request(RequestBody::KillJob { job_ids: to_kill });
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    fn register_job(&mut self, mut job: Job) -> Result<()> {
        self.ensure_running("register_job")?;
        job.subtime = self.now;
        job.state = JobState::Submitted;
        self.ledger.register(job.clone())?;
        self.queue_request(RequestBody::RegisterJob {
            job_id: job.id.clone(),
            job: job.clone(),
        });
        self.dispatch_local(vec![Event::new(
            self.now,
            EventBody::JobSubmitted {
                job_id: job.id.clone(),
                job,
            },
        )])
    }

    fn register_profile(&mut self, workload: &str, profile: ExecutionProfile) -> Result<()> {
        self.ensure_running("register_profile")?;
        self.queue_request(RequestBody::RegisterProfile {
            workload_name: workload.to_string(),
            profile_name: profile.name.clone(),
            profile,
        });
        Ok(())
    }

    #[tracing::instrument(skip(self, resources), fields(resources = %resources, now = %self.now))]
    fn set_resource_power_state(&mut self, resources: &ProcSet, state: PowerStateId) -> Result<()> {
        self.ensure_running("set_resource_power_state")?;
        let platform = self
            .platform
            .as_ref()
            .ok_or(SimError::NotRunning { op: "set_resource_power_state" })?;
        let plan = power::plan(platform, resources, state)?;

        self.queue_request(RequestBody::SetResourceState {
            resources: resources.clone(),
            state,
        });
        // 外部进程只回报最终状态，过渡状态需要在本地分发
        self.dispatch_local(plan.transition_events(self.now))
    }

    fn schedule_callback(&mut self, at: SimTime) -> Result<()> {
        self.ensure_running("schedule_callback")?;
        if at < self.now {
            return Err(SimError::CallbackInPast { at, now: self.now });
        }
        if self.pending_calls.insert(at) {
            self.queue_request(RequestBody::CallMeLater {
                at: at.as_secs_f64() + CALL_ME_LATER_OFFSET,
            });
        }
        Ok(())
    }

    fn notify(&mut self, kind: NotifyType) -> Result<()> {
        self.ensure_running("notify")?;
        self.queue_request(RequestBody::Notify { kind });
        self.dispatch_local(vec![Event::new(self.now, EventBody::Notify { kind })])
    }

    fn set_callback(&mut self, event_type: EventType, callback: Callback) {
        self.callbacks.register(event_type, callback);
    }

    fn add_monitor(&mut self, monitor: Box<dyn Monitor>) {
        self.monitors.push(monitor);
    }
}
