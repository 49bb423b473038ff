//! 错误类型
//!
//! 引擎不做任何自动重试：前置条件违例与外部进程故障都直接向调用方传播。

use super::time::SimTime;
use crate::platform::{NodeId, PowerStateId, PowerStateKind, ResourceId};
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation is already running")]
    AlreadyRunning,

    #[error("{op}: simulation is not running")]
    NotRunning { op: &'static str },

    #[error("{op}: handle re-entered while dispatching events")]
    Reentrant { op: &'static str },

    #[error("a platform description is required to start a simulation")]
    MissingPlatform,

    #[error("{op}: unknown job `{job_id}`")]
    UnknownJob { op: &'static str, job_id: String },

    #[error("job `{job_id}` is already pending or running")]
    DuplicateJob { job_id: String },

    #[error("unknown resource {resource_id}")]
    UnknownResource { resource_id: ResourceId },

    #[error("unknown node {node_id}")]
    UnknownNode { node_id: NodeId },

    #[error("job `{job_id}` references unregistered profile `{profile}`")]
    UnknownProfile { job_id: String, profile: String },

    #[error("node {node_id} has no power state {state_id}")]
    UnknownPowerState { node_id: NodeId, state_id: PowerStateId },

    #[error("node {node_id} has no {kind:?} power state")]
    MissingTransitionState { node_id: NodeId, kind: PowerStateKind },

    #[error("job `{job_id}` was executed on an empty allocation")]
    EmptyAllocation { job_id: String },

    #[error("cannot schedule a callback at {at}, current time is {now}")]
    CallbackInPast { at: SimTime, now: SimTime },

    #[error("profile `{profile}` has unsupported kind `{kind}`")]
    UnsupportedProfile { profile: String, kind: String },

    #[error("no pending events at {now} but jobs or submissions are still outstanding")]
    NoPendingWork { now: SimTime },

    #[error("external simulator exited unexpectedly ({status})")]
    ProcessExited { status: ExitStatus },

    #[error("channel to the external simulator was closed")]
    ChannelClosed,

    #[error("malformed message: {reason}")]
    Malformed { reason: String },

    #[error("cannot load description {}: {source}", path.display())]
    Description {
        path: PathBuf,
        #[source]
        source: Box<SimError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn malformed(reason: impl Into<String>) -> SimError {
        SimError::Malformed {
            reason: reason.into(),
        }
    }
}
