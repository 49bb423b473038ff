//! 事件与请求
//!
//! `Event`（引擎 → 策略）与 `Request`（引擎 → 外部仿真进程）共用同一个带时间戳的外壳
//! `Stamped<D>`，方向 `D` 决定载荷的类型族。线上格式为
//! `{"timestamp": <秒>, "type": "<TYPE>", "data": {...}}`。

use super::time::SimTime;
use crate::job::{ExecutionProfile, Job, JobId, JobState};
use crate::platform::{Platform, PowerStateId, ProcSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 消息方向：决定 `Stamped` 携带的载荷类型。
pub trait Direction: fmt::Debug + Clone + PartialEq {
    type Body: fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned;
}

/// 入站方向：分发给回调的事件。
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound;

/// 出站方向：发往外部仿真进程的请求。
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound;

impl Direction for Inbound {
    type Body = EventBody;
}

impl Direction for Outbound {
    type Body = RequestBody;
}

/// 带时间戳的事件或请求，创建后不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct Stamped<D: Direction> {
    pub timestamp: SimTime,
    #[serde(flatten)]
    pub body: D::Body,
}

pub type Event = Stamped<Inbound>;
pub type Request = Stamped<Outbound>;

impl<D: Direction> Stamped<D> {
    pub fn new(timestamp: SimTime, body: D::Body) -> Self {
        Stamped { timestamp, body }
    }
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.body.event_type()
    }
}

/// 事件类型（封闭集合），回调按此类型注册。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SimulationBegins,
    SimulationEnds,
    JobSubmitted,
    JobAllocated,
    JobRejected,
    JobStarted,
    JobCompleted,
    JobKilled,
    ResourceStateChanged,
    ResourcePowerStateChanged,
    ResourceSwitchingOff,
    ResourceSwitchingOn,
    ResourceSleep,
    ResourceOn,
    ResourceIdle,
    ResourceComputing,
    RequestedCall,
    Notify,
}

/// 资源（主机）层面的运行状态，由功耗状态与作业事件派生。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    Idle,
    Computing,
    SwitchingOn,
    SwitchingOff,
    Sleeping,
}

/// 通知类型：既作为请求发出，也作为事件在本地分发。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyType {
    NoMoreStaticJobToSubmit,
    NoMoreExternalEventToOccur,
    RegistrationFinished,
    ContinueRegistration,
}

/// 事件载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventBody {
    /// 仿真开始，携带平台快照
    SimulationBegins { platform: Platform },
    SimulationEnds {},
    JobSubmitted { job_id: JobId, job: Job },
    JobAllocated { job_id: JobId, alloc: ProcSet },
    JobRejected { job_id: JobId },
    JobStarted { job_id: JobId, alloc: ProcSet },
    JobCompleted {
        job_id: JobId,
        job_state: JobState,
        return_code: i32,
        alloc: ProcSet,
    },
    /// `alloc` 为被终止作业所释放的资源（外部进程可能不提供）
    JobKilled {
        job_ids: Vec<JobId>,
        #[serde(default)]
        alloc: ProcSet,
    },
    ResourceStateChanged {
        resources: ProcSet,
        state: ResourceState,
    },
    ResourcePowerStateChanged {
        resources: ProcSet,
        state: PowerStateId,
    },
    ResourceSwitchingOff { resources: ProcSet },
    ResourceSwitchingOn { resources: ProcSet },
    ResourceSleep { resources: ProcSet },
    ResourceOn { resources: ProcSet },
    ResourceIdle { resources: ProcSet },
    ResourceComputing { resources: ProcSet },
    RequestedCall {},
    Notify {
        #[serde(rename = "type")]
        kind: NotifyType,
    },
}

impl EventBody {
    pub fn event_type(&self) -> EventType {
        match self {
            EventBody::SimulationBegins { .. } => EventType::SimulationBegins,
            EventBody::SimulationEnds {} => EventType::SimulationEnds,
            EventBody::JobSubmitted { .. } => EventType::JobSubmitted,
            EventBody::JobAllocated { .. } => EventType::JobAllocated,
            EventBody::JobRejected { .. } => EventType::JobRejected,
            EventBody::JobStarted { .. } => EventType::JobStarted,
            EventBody::JobCompleted { .. } => EventType::JobCompleted,
            EventBody::JobKilled { .. } => EventType::JobKilled,
            EventBody::ResourceStateChanged { .. } => EventType::ResourceStateChanged,
            EventBody::ResourcePowerStateChanged { .. } => EventType::ResourcePowerStateChanged,
            EventBody::ResourceSwitchingOff { .. } => EventType::ResourceSwitchingOff,
            EventBody::ResourceSwitchingOn { .. } => EventType::ResourceSwitchingOn,
            EventBody::ResourceSleep { .. } => EventType::ResourceSleep,
            EventBody::ResourceOn { .. } => EventType::ResourceOn,
            EventBody::ResourceIdle { .. } => EventType::ResourceIdle,
            EventBody::ResourceComputing { .. } => EventType::ResourceComputing,
            EventBody::RequestedCall {} => EventType::RequestedCall,
            EventBody::Notify { .. } => EventType::Notify,
        }
    }

    /// 事件涉及的作业 id（无则为 `None`）
    pub fn job_id(&self) -> Option<&str> {
        match self {
            EventBody::JobSubmitted { job_id, .. }
            | EventBody::JobAllocated { job_id, .. }
            | EventBody::JobRejected { job_id }
            | EventBody::JobStarted { job_id, .. }
            | EventBody::JobCompleted { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

/// 请求载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestBody {
    RejectJob {
        job_id: JobId,
    },
    ExecuteJob {
        job_id: JobId,
        alloc: ProcSet,
    },
    /// 外部进程在 `at` 之后唤醒引擎（线上字段名为 `timestamp`）
    CallMeLater {
        #[serde(rename = "timestamp")]
        at: f64,
    },
    KillJob {
        job_ids: Vec<JobId>,
    },
    RegisterJob {
        job_id: JobId,
        job: Job,
    },
    RegisterProfile {
        workload_name: String,
        profile_name: String,
        profile: ExecutionProfile,
    },
    SetResourceState {
        resources: ProcSet,
        state: PowerStateId,
    },
    Notify {
        #[serde(rename = "type")]
        kind: NotifyType,
    },
}

impl RequestBody {
    pub fn name(&self) -> &'static str {
        match self {
            RequestBody::RejectJob { .. } => "REJECT_JOB",
            RequestBody::ExecuteJob { .. } => "EXECUTE_JOB",
            RequestBody::CallMeLater { .. } => "CALL_ME_LATER",
            RequestBody::KillJob { .. } => "KILL_JOB",
            RequestBody::RegisterJob { .. } => "REGISTER_JOB",
            RequestBody::RegisterProfile { .. } => "REGISTER_PROFILE",
            RequestBody::SetResourceState { .. } => "SET_RESOURCE_STATE",
            RequestBody::Notify { .. } => "NOTIFY",
        }
    }
}

/// 线上消息：`{now, events}`，每次 `advance` 往返一次。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct Message<D: Direction> {
    pub now: SimTime,
    pub events: Vec<Stamped<D>>,
}

impl<D: Direction> Message<D> {
    pub fn new(now: SimTime, events: Vec<Stamped<D>>) -> Self {
        Message { now, events }
    }
}
