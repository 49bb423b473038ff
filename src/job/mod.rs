//! 作业模块
//!
//! 作业、执行画像以及作业运行时间模型。

mod execution;
#[allow(clippy::module_inception)]
mod job;
mod profile;

pub use execution::{Completion, plan_completion, required_runtime};
pub use job::{Job, JobId, JobState};
pub use profile::{ExecutionProfile, ProfileKind};
